use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::request::RequestContext;
use crate::response::Response;

/// A stage in a route chain.
///
/// `before` runs ahead of the handler and may rewrite the request, answer it
/// early with `Ok(Some(response))`, or fail. A failure is handed to the
/// route's error-catch handler. `after` runs on the final response of every
/// stage whose `before` was entered, in declaration order.
pub trait Middleware: Send + Sync {
    fn before(&self, _ctx: &mut RequestContext) -> anyhow::Result<Option<Response>> {
        Ok(None)
    }

    fn after(&self, _ctx: &RequestContext, _res: &mut Response, _latency: Duration) {}
}

/// Middleware built from a closure over the request.
pub struct FnMiddleware<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> anyhow::Result<Option<Response>> + Send + Sync,
{
    fn before(&self, ctx: &mut RequestContext) -> anyhow::Result<Option<Response>> {
        (self.f)(ctx)
    }
}

/// Wrap a closure as a shareable middleware.
pub fn middleware_fn<F>(name: &'static str, f: F) -> Arc<dyn Middleware>
where
    F: Fn(&mut RequestContext) -> anyhow::Result<Option<Response>> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware { name, f })
}

/// Middleware that stamps a fixed request header and lets the request through.
#[derive(Debug, Clone)]
pub struct SetRequestHeader {
    name: String,
    value: String,
}

impl SetRequestHeader {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Middleware for SetRequestHeader {
    fn before(&self, ctx: &mut RequestContext) -> anyhow::Result<Option<Response>> {
        ctx.set_header(&self.name, self.value.clone());
        Ok(None)
    }
}
