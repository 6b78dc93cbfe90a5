//! Path-to-handler routing.
//!
//! The server only talks to the [`Router`] capability. Two tables implement
//! it:
//!
//! - [`ExactRouter`]: the request path must equal a registered path
//! - [`PrefixRouter`]: a registered path is a mount point for everything
//!   below it, e.g. `/static/` serves `/static/js/app.js`

pub mod exact;
pub mod prefix;

pub use exact::ExactRouter;
pub use prefix::PrefixRouter;

use crate::handler::BoxHandler;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route path already in use: {0}")]
    DuplicateRoute(String),
    #[error("invalid route path: {0}")]
    InvalidRoute(String),
}

pub trait Router: Send + Sync + 'static {
    /// Registers `handler` under `path`. Registering a path twice fails;
    /// the first registration stays in place.
    fn add_route(&mut self, path: &str, handler: BoxHandler) -> Result<(), RouteError>;

    /// Resolves the handler for a request path.
    fn get_route(&self, path: &str) -> Result<BoxHandler, RouteError>;
}
