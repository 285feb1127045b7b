//! Router core module - hot path for request routing.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::radix::RadixTree;
use super::ParamVec;
use crate::dispatcher::Chain;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::middleware::Middleware;
use crate::request::{IncomingRequest, RequestContext};
use crate::response::Response;

/// A route as compiled into a [`RouteTable`].
pub struct RouteEntry {
    pub method: Method,
    /// Pattern including every mount prefix
    pub pattern: Arc<str>,
    /// Router-level middleware inherited along the mount path, outermost first
    pub layers: Vec<Arc<dyn Middleware>>,
    pub chain: Arc<Chain>,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("layers", &self.layers.len())
            .field("chain", &self.chain)
            .finish()
    }
}

/// Result of matching a request against the table.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub entry: Arc<RouteEntry>,
    /// Path parameters extracted from the URL
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name.
    ///
    /// Uses "last write wins" semantics when a pattern repeats a name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Immutable, compiled routing table.
///
/// Built once from a [`RouterNode`](super::RouterNode) and shared between
/// connections without locking.
#[derive(Default)]
pub struct RouteTable {
    tree: RadixTree<RouteEntry>,
    entries: Vec<Arc<RouteEntry>>,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("entries", &self.entries)
            .finish()
    }
}

impl RouteTable {
    /// Compile entries in registration order. When two entries share a
    /// method and pattern the first one registered wins.
    pub(crate) fn from_entries(entries: Vec<RouteEntry>) -> Self {
        let mut table = RouteTable::default();
        for entry in entries {
            if table.tree.get(&entry.method, &entry.pattern).is_some() {
                warn!(
                    method = %entry.method,
                    pattern = %entry.pattern,
                    "Duplicate route ignored - first registration wins"
                );
                continue;
            }
            let entry = Arc::new(entry);
            let method = entry.method.clone();
            let pattern = Arc::clone(&entry.pattern);
            table.tree.insert(method, &pattern, Arc::clone(&entry));
            table.entries.push(entry);
        }
        table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compiled entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.entries.iter()
    }

    /// Match a method and path.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let (entry, path_params) = self.tree.search(method, path)?;
        debug!(
            method = %method,
            path = %path,
            pattern = %entry.pattern,
            param_count = path_params.len(),
            "Route matched"
        );
        Some(RouteMatch { entry, path_params })
    }

    /// Route and run a request.
    ///
    /// Unknown methods yield a JSON 400 and unmatched paths a JSON 404; every
    /// other outcome comes from the matched route's chain.
    #[must_use]
    pub fn dispatch(&self, req: IncomingRequest) -> Response {
        let Ok(method) = Method::from_bytes(req.method.as_bytes()) else {
            return Response::json(json!({
                "error": "Bad Request",
                "method": req.method,
                "path": req.path,
            }))
            .with_status(400);
        };

        let Some(matched) = self.route(&method, &req.path) else {
            debug!(method = %method, path = %req.path, "No route matched");
            return not_found(&req.method, &req.path);
        };

        let params = match decode_path_params(&matched.path_params) {
            Ok(params) => params,
            Err(name) => {
                debug!(
                    method = %method,
                    path = %req.path,
                    param = %name,
                    "Undecodable path parameter"
                );
                return Response::json(json!({
                    "error": "Bad Request",
                    "error_description": format!("Failed to decode param {name:?}"),
                    "path": req.path,
                }))
                .with_status(400);
            }
        };

        let mut ctx = context_for(method, req, &matched, params);
        matched.entry.chain.run(&matched.entry.layers, &mut ctx)
    }
}

/// `404 {"error": "Not Found", "method", "path"}`.
#[must_use]
pub fn not_found(method: &str, path: &str) -> Response {
    Response::json(json!({
        "error": "Not Found",
        "method": method,
        "path": path,
    }))
    .with_status(404)
}

/// Percent-decode captured segments. Fails with the parameter name when a
/// segment does not decode to UTF-8.
fn decode_path_params(raw: &ParamVec) -> Result<Map<String, Value>, Arc<str>> {
    let mut params = Map::new();
    for (name, value) in raw {
        let decoded = urlencoding::decode(value).map_err(|_| Arc::clone(name))?;
        params.insert(String::from(name.as_ref()), Value::String(decoded.into_owned()));
    }
    Ok(params)
}

fn context_for(
    method: Method,
    req: IncomingRequest,
    matched: &RouteMatch,
    params: Map<String, Value>,
) -> RequestContext {
    let request_id = RequestId::from_header_or_new(req.get_header(REQUEST_ID_HEADER));

    let mut query = Map::new();
    for (k, v) in req.query {
        query.insert(k, Value::String(v));
    }

    RequestContext {
        request_id,
        method,
        path: req.path,
        route: Arc::clone(&matched.entry.pattern),
        headers: req.headers,
        query,
        params,
        body: req.body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouterNode;
    use serde_json::json;

    fn table() -> RouteTable {
        let root = RouterNode::new();
        root.get("/items/:id", |ctx| {
            Ok(Response::json(json!({
                "id": ctx.path_param("id"),
                "q": ctx.query_param("q"),
                "route": ctx.route.as_ref(),
            })))
        });
        root.build().unwrap()
    }

    #[test]
    fn test_dispatch_builds_context() {
        let res = table().dispatch(IncomingRequest::new("GET", "/items/5?q=a&q=b"));
        assert_eq!(res.status, 200);
        assert_eq!(
            res.json_body(),
            Some(&json!({"id": "5", "q": "b", "route": "/items/:id"}))
        );
    }

    #[test]
    fn test_path_params_are_percent_decoded() {
        let res = table().dispatch(IncomingRequest::new("GET", "/items/a%20b%2Fc"));
        assert_eq!(res.status, 200);
        assert_eq!(res.json_body().unwrap()["id"], "a b/c");

        let res = table().dispatch(IncomingRequest::new("GET", "/items/a+b"));
        assert_eq!(res.json_body().unwrap()["id"], "a+b");
    }

    #[test]
    fn test_undecodable_path_param_is_400() {
        let res = table().dispatch(IncomingRequest::new("GET", "/items/%FF"));
        assert_eq!(res.status, 400);
        assert_eq!(res.json_body().unwrap()["error"], "Bad Request");
    }

    #[test]
    fn test_unmatched_path_is_json_404() {
        let res = table().dispatch(IncomingRequest::new("GET", "/nope"));
        assert_eq!(res.status, 404);
        assert_eq!(
            res.json_body(),
            Some(&json!({"error": "Not Found", "method": "GET", "path": "/nope"}))
        );
    }

    #[test]
    fn test_wrong_method_is_404() {
        let res = table().dispatch(IncomingRequest::new("DELETE", "/items/5"));
        assert_eq!(res.status, 404);
    }

    #[test]
    fn test_malformed_method_is_400() {
        let res = table().dispatch(IncomingRequest::new("G E T", "/items/5"));
        assert_eq!(res.status, 400);
    }

    #[test]
    fn test_first_registration_wins() {
        let root = RouterNode::new();
        root.get("/dup", |_ctx| Ok(Response::plain("first")));
        root.get("/dup", |_ctx| Ok(Response::plain("second")));
        let table = root.build().unwrap();
        assert_eq!(table.len(), 1);
        let res = table.dispatch(IncomingRequest::new("GET", "/dup"));
        assert_eq!(res.body, crate::response::Body::Text("first".to_string()));
    }
}
