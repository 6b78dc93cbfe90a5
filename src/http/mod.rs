//! HTTP/1.x protocol implementation.
//!
//! # Architecture
//!
//! - **`header`**: case-insensitive, multi-valued header map
//! - **`status`**: the status codes the server emits and their reason phrases
//! - **`request`**: parsed request representation
//! - **`parser`**: reads one request at a time off a buffered byte stream
//! - **`response`**: response under construction, serialized section by section
//! - **`writer`**: wire serialization of status line, headers and body
//! - **`keep_alive`**: keep-alive parameters and the policy choosing them
//! - **`connection`**: the per-socket request loop
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!   ┌──▶ │   Reading   │ ← Parse the next request
//!   │    └──────┬──────┘
//!   │           │ Request parsed (or 500 page for a malformed one)
//!   │           ▼
//!   │    ┌──────────────────┐
//!   │    │   Dispatching    │ ← Route and run the handler
//!   │    └──────┬───────────┘
//!   │           │ Response serialized
//!   │           ▼
//!   │    ┌──────────────────┐
//!   │    │    Writing       │ ← Flush to the socket
//!   │    └──────┬───────────┘
//!   │           ├─ HTTP/1.1 → Idle (wait up to the keep-alive timeout)
//!   │           └─ otherwise → Closed
//!   │    ┌──────────────────┐
//!   └─── │      Idle        │ ── timeout / peer hang-up → Closed
//!        └──────────────────┘
//! ```

pub mod connection;
pub mod header;
pub mod keep_alive;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod writer;
