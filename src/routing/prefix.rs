use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::handler::BoxHandler;
use crate::routing::{RouteError, Router};

/// Route table keyed by path prefix.
///
/// When several registered prefixes match, the longest one wins, so
/// `/static/img/` can be mounted alongside `/static/` and `/`.
#[derive(Default)]
pub struct PrefixRouter {
    routes: HashMap<String, BoxHandler>,
}

impl PrefixRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Router for PrefixRouter {
    fn add_route(&mut self, path: &str, handler: BoxHandler) -> Result<(), RouteError> {
        match self.routes.entry(path.to_string()) {
            Entry::Occupied(_) => Err(RouteError::DuplicateRoute(path.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    fn get_route(&self, path: &str) -> Result<BoxHandler, RouteError> {
        self.routes
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, handler)| Arc::clone(handler))
            .ok_or_else(|| RouteError::InvalidRoute(path.to_string()))
    }
}
