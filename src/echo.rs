use serde_json::json;

use crate::request::RequestContext;
use crate::response::Response;

/// Echo the request back as JSON.
///
/// Registered under the name `echo` in [`Registry::with_builtins`](crate::module::Registry::with_builtins).
pub fn echo_handler(ctx: &mut RequestContext) -> anyhow::Result<Response> {
    Ok(Response::json(json!({
        "method": ctx.method.as_str(),
        "path": ctx.path,
        "route": ctx.route.as_ref(),
        "params": ctx.params,
        "query": ctx.query,
        "headers": ctx.headers_json(),
        "body": ctx.body,
    })))
}

/// Empty 200.
pub fn empty_handler(_ctx: &mut RequestContext) -> anyhow::Result<Response> {
    Ok(Response::default())
}
