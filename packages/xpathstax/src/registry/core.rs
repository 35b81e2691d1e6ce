//! Registry mapping path patterns to handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::handler::{NodeConverter, NodeHandler};
use crate::xpath::XPathRequest;

/// A pattern and the handler registered under it.
#[derive(Clone)]
pub struct Registration {
    pub request: Arc<XPathRequest>,
    pub handler: Arc<dyn NodeHandler>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("request", &self.request.expression())
            .finish_non_exhaustive()
    }
}

/// Registry mapping compiled path patterns to handlers.
///
/// Keys are unique by structure: registering a handler under a pattern that
/// compiles to the same steps as an existing one replaces that handler.
/// Registration takes `&self` and may happen from several threads; a parse
/// works on a [`snapshot`](HandlerRegistry::snapshot) taken when it starts.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<Arc<XPathRequest>, Arc<dyn NodeHandler>>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a pattern, replacing any handler registered
    /// under an identical pattern.
    pub fn register(&self, request: XPathRequest, handler: Arc<dyn NodeHandler>) {
        let request = Arc::new(request);
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        // Drop the old key too, so the latest expression text is kept.
        if handlers.remove(&request).is_some() {
            tracing::debug!(expression = %request.expression(), "Replacing handler");
        }
        handlers.insert(request, handler);
    }

    /// Register a converter under the pattern it declares.
    pub fn register_converter<C: NodeConverter + 'static>(&self, converter: Arc<C>) {
        let request = converter.request();
        self.register(request, converter);
    }

    /// Remove the handler registered under `request`.
    ///
    /// Returns whether a handler was removed.
    pub fn remove(&self, request: &XPathRequest) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(request)
            .is_some()
    }

    /// Check if a handler is registered for a pattern.
    #[must_use]
    pub fn contains(&self, request: &XPathRequest) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(request)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return all registered patterns.
    #[must_use]
    pub fn requests(&self) -> Vec<XPathRequest> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|request| XPathRequest::clone(request))
            .collect()
    }

    /// Copy out the current registrations.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Registration> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(request, handler)| Registration {
                request: Arc::clone(request),
                handler: Arc::clone(handler),
            })
            .collect()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut expressions: Vec<String> = self
            .requests()
            .iter()
            .map(|r| r.expression().to_string())
            .collect();
        expressions.sort();
        f.debug_struct("HandlerRegistry")
            .field("requests", &expressions)
            .finish()
    }
}
