use std::time::Duration;
use tracing::{debug, info, warn};

use super::Middleware;
use crate::request::RequestContext;
use crate::response::Response;

/// Logs request entry and completion with status and latency.
///
/// Attach it at router level to get one log line per handled request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, ctx: &mut RequestContext) -> anyhow::Result<Option<Response>> {
        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            route = %ctx.route,
            "Request started"
        );
        Ok(None)
    }

    fn after(&self, ctx: &RequestContext, res: &mut Response, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        if res.status >= 500 {
            warn!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                status = res.status,
                latency_ms = latency_ms,
                "Request failed"
            );
        } else {
            info!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                status = res.status,
                latency_ms = latency_ms,
                "Request completed"
            );
        }
    }
}
