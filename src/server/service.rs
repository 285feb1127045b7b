use arc_swap::ArcSwap;
use http::Method;
use may_minihttp::{HttpService, Request, Response as WireResponse};
use serde_json::json;
use std::io;
use std::sync::Arc;

use super::request::parse_request;
use super::response::MinihttpSink;
use crate::request::IncomingRequest;
use crate::response::Response;
use crate::router::RouteTable;

/// Path of the built-in health check.
pub const HEALTH_PATH: &str = "/health";

/// `may_minihttp` service that routes requests through a [`RouteTable`].
///
/// The table sits behind an [`ArcSwap`], so a freshly loaded table can
/// replace it while connections are being served.
#[derive(Clone)]
pub struct AppService {
    table: Arc<ArcSwap<RouteTable>>,
    health_endpoint: bool,
}

impl AppService {
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(ArcSwap::from_pointee(table)),
            health_endpoint: true,
        }
    }

    /// Enable or disable the built-in `GET /health` fallback.
    #[must_use]
    pub fn with_health_endpoint(mut self, enabled: bool) -> Self {
        self.health_endpoint = enabled;
        self
    }

    /// Swap in a new table for subsequent requests.
    pub fn replace_table(&self, table: RouteTable) {
        self.table.store(Arc::new(table));
    }

    /// The table currently serving requests.
    #[must_use]
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Route a request already parsed from the wire.
    ///
    /// Loaded routes take precedence; the health check only answers when no
    /// route matches.
    #[must_use]
    pub fn handle(&self, req: IncomingRequest) -> Response {
        let table = self.table.load();
        if self.health_endpoint
            && req.method == "GET"
            && req.path == HEALTH_PATH
            && table.route(&Method::GET, HEALTH_PATH).is_none()
        {
            return health_endpoint();
        }
        table.dispatch(req)
    }
}

/// Basic health check response, `{ "status": "ok" }`.
#[must_use]
pub fn health_endpoint() -> Response {
    Response::json(json!({ "status": "ok" }))
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut WireResponse) -> io::Result<()> {
        let incoming = parse_request(req);
        let response = self.handle(incoming);
        response.materialize(&mut MinihttpSink::new(res));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouterNode;

    #[test]
    fn test_health_fallback() {
        let service = AppService::new(RouteTable::default());
        let res = service.handle(IncomingRequest::new("GET", "/health"));
        assert_eq!(res.status, 200);
        assert_eq!(res.json_body(), Some(&json!({"status": "ok"})));
    }

    #[test]
    fn test_health_can_be_disabled() {
        let service = AppService::new(RouteTable::default()).with_health_endpoint(false);
        let res = service.handle(IncomingRequest::new("GET", "/health"));
        assert_eq!(res.status, 404);
    }

    #[test]
    fn test_loaded_route_wins_over_health() {
        let root = RouterNode::new();
        root.get("/health", |_ctx| Ok(Response::plain("custom")));
        let service = AppService::new(root.build().unwrap());
        let res = service.handle(IncomingRequest::new("GET", "/health"));
        assert_eq!(res.to_buffered().text(), "custom");
    }

    #[test]
    fn test_replace_table() {
        let service = AppService::new(RouteTable::default());
        assert_eq!(service.handle(IncomingRequest::new("GET", "/new")).status, 404);

        let root = RouterNode::new();
        root.get("/new", |_ctx| Ok(Response::default()));
        service.replace_table(root.build().unwrap());
        assert_eq!(service.handle(IncomingRequest::new("GET", "/new")).status, 200);
        assert_eq!(service.table().len(), 1);
    }
}
