//! Dispatcher core module - hot path for running a matched route.
//!
//! A [`Chain`] is everything that happens for one route once the route table
//! has matched a request: router-level middleware, the route's composed
//! stages, the handler, and the `after` hooks on the way out. Failures at any
//! point (error returns or panics) are turned into responses by the route's
//! [`ErrorPolicy`].

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::middleware::Middleware;
use crate::policy::ErrorPolicy;
use crate::request::RequestContext;
use crate::response::Response;
use crate::route::Route;

/// A route with its composed middleware stages and error policy.
pub struct Chain {
    route: Arc<dyn Route>,
    stages: Vec<Arc<dyn Middleware>>,
    policy: Arc<ErrorPolicy>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("method", self.route.method())
            .field("path", &self.route.path())
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl Chain {
    #[must_use]
    pub fn new(
        route: Arc<dyn Route>,
        stages: Vec<Arc<dyn Middleware>>,
        policy: Arc<ErrorPolicy>,
    ) -> Self {
        Self {
            route,
            stages,
            policy,
        }
    }

    #[must_use]
    pub fn route(&self) -> &Arc<dyn Route> {
        &self.route
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn policy(&self) -> &Arc<ErrorPolicy> {
        &self.policy
    }

    /// Run the chain for one request.
    ///
    /// `layers` are router-level middleware inherited from the routers the
    /// route was registered on, outermost first. They run ahead of the
    /// route's own stages. The first stage that answers or fails stops the
    /// walk; every stage entered up to that point gets its `after` hook.
    pub fn run(&self, layers: &[Arc<dyn Middleware>], ctx: &mut RequestContext) -> Response {
        let start = Instant::now();
        let mut entered = 0usize;
        let mut early: Option<Response> = None;

        for (idx, mw) in layers.iter().chain(self.stages.iter()).enumerate() {
            entered += 1;
            match guarded(|| mw.before(ctx)) {
                Ok(None) => {}
                Ok(Some(resp)) => {
                    debug!(
                        request_id = %ctx.request_id,
                        middleware_idx = idx,
                        status = resp.status,
                        "Middleware returned early response"
                    );
                    early = Some(resp);
                    break;
                }
                Err(err) => {
                    early = Some(self.policy.handle_error(&err, ctx));
                    break;
                }
            }
        }

        let mut resp = match early {
            Some(resp) => resp,
            None => {
                debug!(
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    route = %ctx.route,
                    "Request dispatched to handler"
                );
                match guarded(|| self.route.handle(ctx)) {
                    Ok(resp) => resp,
                    Err(err) => self.policy.handle_error(&err, ctx),
                }
            }
        };

        let latency = start.elapsed();
        for mw in layers.iter().chain(self.stages.iter()).take(entered) {
            if catch_unwind(AssertUnwindSafe(|| mw.after(ctx, &mut resp, latency))).is_err() {
                error!(
                    request_id = %ctx.request_id,
                    route = %ctx.route,
                    "Middleware after hook panicked"
                );
            }
        }

        info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            status = resp.status,
            latency_ms = latency.as_millis() as u64,
            "Handler response ready"
        );
        resp
    }
}

/// Run `f`, converting a panic into an error.
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(panic_message = %message, "Route chain panicked - recovered");
            Err(anyhow::anyhow!("handler panicked: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::middleware_fn;
    use crate::route::RouteDefinition;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn before(&self, _ctx: &mut RequestContext) -> anyhow::Result<Option<Response>> {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            Ok(None)
        }

        fn after(&self, _ctx: &RequestContext, _res: &mut Response, _latency: Duration) {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_layers_run_before_stages_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);
        let route = RouteDefinition::get("/", move |_ctx| {
            handler_log.lock().unwrap().push("handler".to_string());
            Ok(Response::default())
        })
        .into_route();
        let chain = Chain::new(
            route,
            vec![recorder("stage", &log)],
            Arc::new(ErrorPolicy::default()),
        );
        let mut ctx = RequestContext::new(Method::GET, "/");
        let resp = chain.run(&[recorder("layer", &log)], &mut ctx);
        assert_eq!(resp.status, 200);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "before:layer",
                "before:stage",
                "handler",
                "after:layer",
                "after:stage"
            ]
        );
    }

    #[test]
    fn test_early_response_skips_handler_and_later_stages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::clone(&calls);
        let route = RouteDefinition::get("/", move |_ctx| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response::default())
        })
        .into_route();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new(
            route,
            vec![
                middleware_fn("deny", |_ctx| Ok(Some(Response::empty(403)))),
                recorder("late", &log),
            ],
            Arc::new(ErrorPolicy::default()),
        );
        let mut ctx = RequestContext::new(Method::GET, "/");
        assert_eq!(chain.run(&[], &mut ctx).status, 403);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_error_goes_to_policy() {
        let route =
            RouteDefinition::get("/throw-error", |_ctx| Err(anyhow::anyhow!("Error"))).into_route();
        let chain = Chain::new(route, Vec::new(), Arc::new(ErrorPolicy::default()));
        let mut ctx = RequestContext::new(Method::GET, "/throw-error");
        let resp = chain.run(&[], &mut ctx);
        assert_eq!(resp.status, 500);
        assert_eq!(resp.json_body().unwrap()["error_description"], "Error");
    }

    #[test]
    fn test_handler_panic_is_recovered() {
        let route = RouteDefinition::get("/panic", |_ctx| -> anyhow::Result<Response> {
            panic!("kaboom")
        })
        .into_route();
        let chain = Chain::new(route, Vec::new(), Arc::new(ErrorPolicy::default()));
        let mut ctx = RequestContext::new(Method::GET, "/panic");
        let resp = chain.run(&[], &mut ctx);
        assert_eq!(resp.status, 500);
        let description = resp.json_body().unwrap()["error_description"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(description.contains("kaboom"));
    }

    #[test]
    fn test_middleware_error_goes_to_policy() {
        let route = RouteDefinition::get("/", |_ctx| Ok(Response::default())).into_route();
        let chain = Chain::new(
            route,
            vec![middleware_fn("fail", |_ctx| Err(anyhow::anyhow!("no session")))],
            Arc::new(ErrorPolicy::default()),
        );
        let mut ctx = RequestContext::new(Method::GET, "/");
        let resp = chain.run(&[], &mut ctx);
        assert_eq!(resp.status, 500);
        assert_eq!(resp.json_body().unwrap()["error_description"], "no session");
    }
}
