//! Request handlers.
//!
//! A [`Handler`] receives a parsed request and a fresh response, and is
//! responsible for serializing that response before it returns. Handlers
//! compose by delegation: the file server hands failures to the error page
//! writer rather than rendering them itself.

pub mod error_page;
pub mod files;

use std::sync::Arc;

use async_trait::async_trait;

use crate::http::request::Request;
use crate::http::response::Response;

pub use error_page::ErrorHandler;
pub use files::FileServer;

/// Value sent in the `Server` response header.
pub const SERVER_NAME: &str = "Ferrule";

#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Fills in and serializes `response`.
    ///
    /// Must not panic; internal failures are reported as an error status.
    async fn handle(&self, request: &Request, response: &mut Response);
}

/// Shared, type-erased handler as stored in route tables.
pub type BoxHandler = Arc<dyn Handler>;

/// Adapter turning a plain closure into a [`Handler`].
pub struct HandlerFn<F>(F);

/// Wraps a synchronous closure as a handler.
///
/// ```
/// # use ferrule::handler::handler_fn;
/// # use ferrule::http::status::StatusCode;
/// let hello = handler_fn(|_req, res| {
///     let _ = res.send(StatusCode::Ok, "text/plain", "hello");
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    async fn handle(&self, request: &Request, response: &mut Response) {
        (self.0)(request, response)
    }
}

/// Current time in the RFC 1123 format used by the `Date` header.
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// One access-log line per answered request.
pub(crate) fn log_access(request: &Request, response: &Response) {
    tracing::info!(
        host = request.host(),
        method = %request.method,
        path = request.path(),
        version = %request.version,
        status = response.status.map(|s| s.as_u16()).unwrap_or(0),
        "Request served"
    );
}
