//! Ferrule - a small HTTP/1.x file server
//!
//! Core library: wire protocol, routing, handlers and the server loops.

pub mod config;
pub mod handler;
pub mod http;
pub mod routing;
pub mod server;
