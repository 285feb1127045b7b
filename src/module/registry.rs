use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Decorator;
use crate::echo::{echo_handler, empty_handler};
use crate::error::ResolveError;
use crate::middleware::{Middleware, TracingMiddleware};
use crate::request::RequestContext;
use crate::response::Response;
use crate::route::{HandlerFn, Route, RouteFactory};
use crate::router::RouterNode;

/// Named functions that manifests refer to.
///
/// Handlers, middleware, route factories and decorators are registered
/// under a name at startup; the [`ManifestResolver`](super::ManifestResolver)
/// binds manifest references against them. Registering a name twice keeps
/// the later entry.
pub struct Registry<P> {
    handlers: HashMap<String, HandlerFn>,
    middleware: HashMap<String, Arc<dyn Middleware>>,
    factories: HashMap<String, RouteFactory<P>>,
    decorators: HashMap<String, Decorator<P>>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            middleware: HashMap::new(),
            factories: HashMap::new(),
            decorators: HashMap::new(),
        }
    }
}

impl<P> fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&String> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("Registry")
            .field("handlers", &handlers)
            .field("middleware", &self.middleware.len())
            .field("factories", &self.factories.len())
            .field("decorators", &self.decorators.len())
            .finish()
    }
}

impl<P> Registry<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `echo` and `empty` handlers and the
    /// `tracing` middleware.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_handler("echo", echo_handler);
        registry.register_handler("empty", empty_handler);
        registry.register_middleware("tracing", Arc::new(TracingMiddleware));
        registry
    }

    pub fn register_handler<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut RequestContext) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.handlers.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn register_middleware(&mut self, name: &str, mw: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.insert(name.to_string(), mw);
        self
    }

    pub fn register_factory<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&P) -> anyhow::Result<Arc<dyn Route>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    pub fn register_decorator<F>(&mut self, name: &str, decorator: F) -> &mut Self
    where
        F: Fn(&RouterNode, &P) -> anyhow::Result<RouterNode> + Send + Sync + 'static,
    {
        self.decorators.insert(name.to_string(), Arc::new(decorator));
        self
    }

    /// # Errors
    ///
    /// [`ResolveError::UnknownName`] when nothing is registered under `name`.
    pub fn handler(&self, name: &str) -> Result<HandlerFn, ResolveError> {
        self.handlers
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| unknown("handler", name))
    }

    /// # Errors
    ///
    /// [`ResolveError::UnknownName`] when nothing is registered under `name`.
    pub fn middleware(&self, name: &str) -> Result<Arc<dyn Middleware>, ResolveError> {
        self.middleware
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| unknown("middleware", name))
    }

    /// # Errors
    ///
    /// [`ResolveError::UnknownName`] when nothing is registered under `name`.
    pub fn factory(&self, name: &str) -> Result<RouteFactory<P>, ResolveError> {
        self.factories
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| unknown("factory", name))
    }

    /// # Errors
    ///
    /// [`ResolveError::UnknownName`] when nothing is registered under `name`.
    pub fn decorator(&self, name: &str) -> Result<Decorator<P>, ResolveError> {
        self.decorators
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| unknown("decorator", name))
    }
}

fn unknown(kind: &'static str, name: &str) -> ResolveError {
    ResolveError::UnknownName {
        kind,
        name: name.to_string(),
    }
}
