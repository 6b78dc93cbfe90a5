use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::handler::BoxHandler;
use crate::routing::{RouteError, Router};

/// Route table keyed by the full request path.
#[derive(Default)]
pub struct ExactRouter {
    routes: HashMap<String, BoxHandler>,
}

impl ExactRouter {
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

impl Router for ExactRouter {
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
            .get(path)
            .map(Arc::clone)
            .ok_or_else(|| RouteError::InvalidRoute(path.to_string()))
    }
}
