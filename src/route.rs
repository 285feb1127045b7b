//! The route contract.
//!
//! A [`Route`] describes one endpoint: method, path pattern, optional schemas
//! for the three request sections, optional middleware lists and the handler
//! itself. [`RouteDefinition`] is the ready-made implementation most code
//! uses; types with their own state can implement the trait directly.
//!
//! Modules hand routes to the loader through a [`RouteProvider`]: either a
//! ready instance or a factory that receives the loader's construct
//! parameters.

use http::Method;
use std::fmt;
use std::sync::Arc;

use crate::middleware::Middleware;
use crate::request::RequestContext;
use crate::response::Response;
use crate::schema::Schema;

/// Handler function signature.
pub type HandlerFn =
    Arc<dyn Fn(&mut RequestContext) -> anyhow::Result<Response> + Send + Sync>;

/// Builds a route from the loader's construct parameters.
pub type RouteFactory<P> = Arc<dyn Fn(&P) -> anyhow::Result<Arc<dyn Route>> + Send + Sync>;

/// One endpoint.
///
/// `method` and `path` must not change for the lifetime of the value.
pub trait Route: Send + Sync {
    fn method(&self) -> &Method;

    /// Route pattern; `:name` and `{name}` segments capture path parameters.
    fn path(&self) -> &str;

    /// Display path, e.g. including the prefix the route is mounted under.
    fn full_path(&self) -> &str {
        self.path()
    }

    fn body_schema(&self) -> Option<&Schema> {
        None
    }

    fn query_schema(&self) -> Option<&Schema> {
        None
    }

    fn parameters_schema(&self) -> Option<&Schema> {
        None
    }

    /// Runs before input validation.
    fn pre_middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }

    /// Runs after input validation, before the handler.
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }

    /// # Errors
    ///
    /// Any error is passed to the loader's error-catch handler.
    fn handle(&self, ctx: &mut RequestContext) -> anyhow::Result<Response>;
}

/// How a module supplies its route.
pub enum RouteProvider<P> {
    Instance(Arc<dyn Route>),
    Factory(RouteFactory<P>),
}

impl<P> Clone for RouteProvider<P> {
    fn clone(&self) -> Self {
        match self {
            RouteProvider::Instance(route) => RouteProvider::Instance(Arc::clone(route)),
            RouteProvider::Factory(factory) => RouteProvider::Factory(Arc::clone(factory)),
        }
    }
}

impl<P> fmt::Debug for RouteProvider<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteProvider::Instance(route) => f
                .debug_tuple("Instance")
                .field(&format_args!("{} {}", route.method(), route.path()))
                .finish(),
            RouteProvider::Factory(_) => f.write_str("Factory"),
        }
    }
}

impl<P> RouteProvider<P> {
    /// Produce the route, calling the factory when there is one.
    ///
    /// # Errors
    ///
    /// Propagates the factory's error.
    pub fn instantiate(&self, params: &P) -> anyhow::Result<Arc<dyn Route>> {
        match self {
            RouteProvider::Instance(route) => Ok(Arc::clone(route)),
            RouteProvider::Factory(factory) => factory(params),
        }
    }
}

/// Parse a method token case-insensitively.
///
/// # Errors
///
/// Returns the rejected token when it is not a valid HTTP method.
pub fn parse_method(raw: &str) -> Result<Method, String> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(raw.to_string());
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| raw.to_string())
}

/// Data-driven [`Route`] implementation.
#[derive(Clone)]
pub struct RouteDefinition {
    method: Method,
    path: String,
    full_path: Option<String>,
    body_schema: Option<Schema>,
    query_schema: Option<Schema>,
    parameters_schema: Option<Schema>,
    pre_middleware: Vec<Arc<dyn Middleware>>,
    middleware: Vec<Arc<dyn Middleware>>,
    handler: HandlerFn,
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("full_path", &self.full_path)
            .field("body_schema", &self.body_schema)
            .field("query_schema", &self.query_schema)
            .field("parameters_schema", &self.parameters_schema)
            .field("pre_middleware", &self.pre_middleware.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl RouteDefinition {
    pub fn new<F>(method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut RequestContext) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        Self::from_handler(method, path, Arc::new(handler))
    }

    #[must_use]
    pub fn from_handler(method: Method, path: impl Into<String>, handler: HandlerFn) -> Self {
        Self {
            method,
            path: path.into(),
            full_path: None,
            body_schema: None,
            query_schema: None,
            parameters_schema: None,
            pre_middleware: Vec::new(),
            middleware: Vec::new(),
            handler,
        }
    }

    pub fn get<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut RequestContext) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        Self::new(Method::GET, path, handler)
    }

    pub fn post<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut RequestContext) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        Self::new(Method::POST, path, handler)
    }

    #[must_use]
    pub fn with_full_path(mut self, full_path: impl Into<String>) -> Self {
        self.full_path = Some(full_path.into());
        self
    }

    #[must_use]
    pub fn with_body_schema(mut self, schema: impl Into<Schema>) -> Self {
        self.body_schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_query_schema(mut self, schema: impl Into<Schema>) -> Self {
        self.query_schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_parameters_schema(mut self, schema: impl Into<Schema>) -> Self {
        self.parameters_schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_pre_middleware(mut self, mw: Arc<dyn Middleware>) -> Self {
        self.pre_middleware.push(mw);
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, mw: Arc<dyn Middleware>) -> Self {
        self.middleware.push(mw);
        self
    }

    /// Wrap into the shared form modules hand out.
    #[must_use]
    pub fn into_route(self) -> Arc<dyn Route> {
        Arc::new(self)
    }
}

impl Route for RouteDefinition {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn full_path(&self) -> &str {
        self.full_path.as_deref().unwrap_or(&self.path)
    }

    fn body_schema(&self) -> Option<&Schema> {
        self.body_schema.as_ref()
    }

    fn query_schema(&self) -> Option<&Schema> {
        self.query_schema.as_ref()
    }

    fn parameters_schema(&self) -> Option<&Schema> {
        self.parameters_schema.as_ref()
    }

    fn pre_middleware(&self) -> Vec<Arc<dyn Middleware>> {
        self.pre_middleware.clone()
    }

    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        self.middleware.clone()
    }

    fn handle(&self, ctx: &mut RequestContext) -> anyhow::Result<Response> {
        (self.handler)(ctx)
    }
}
