use http::Method;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use super::core::{RouteEntry, RouteTable};
use super::RouterError;
use crate::dispatcher::Chain;
use crate::middleware::Middleware;
use crate::policy::ErrorPolicy;
use crate::request::RequestContext;
use crate::response::Response;
use crate::route::{Route, RouteDefinition};

struct Registration {
    method: Method,
    path: String,
    chain: Arc<Chain>,
}

#[derive(Default)]
struct NodeInner {
    routes: Vec<Registration>,
    middleware: Vec<Arc<dyn Middleware>>,
    mounts: Vec<(String, RouterNode)>,
}

/// Shareable registration handle for a router.
///
/// Cloning yields another handle to the same router. Routes, router-level
/// middleware and mounted sub-routers can be added from any handle; nothing
/// is matched against requests until [`build`](Self::build) compiles the
/// tree into a [`RouteTable`].
#[derive(Clone, Default)]
pub struct RouterNode {
    inner: Arc<RwLock<NodeInner>>,
}

impl fmt::Debug for RouterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("RouterNode")
            .field("routes", &inner.routes.len())
            .field("middleware", &inner.middleware.len())
            .field("mounts", &inner.mounts.len())
            .finish()
    }
}

/// One registered endpoint as seen from the root router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSummary {
    pub method: Method,
    /// Pattern including every mount prefix
    pub path: String,
    /// The route's own display path
    pub full_path: String,
    /// Composed stages ahead of the handler, router-level middleware excluded
    pub stages: usize,
}

impl RouterNode {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, NodeInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the same router.
    #[must_use]
    pub fn ptr_eq(&self, other: &RouterNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a composed chain under `method` and `path`.
    pub fn register(&self, method: Method, path: &str, chain: Chain) {
        debug!(method = %method, path = %path, stages = chain.stage_count(), "Route registered");
        self.write().routes.push(Registration {
            method,
            path: path.to_string(),
            chain: Arc::new(chain),
        });
    }

    /// Register a route without composed stages, under the default error policy.
    ///
    /// Decorators use this for endpoints they own. Schemas declared by the
    /// route are not enforced here; routes that need validation go through
    /// the loader.
    pub fn register_route(&self, route: Arc<dyn Route>) {
        let method = route.method().clone();
        let path = route.path().to_string();
        let mut stages = route.pre_middleware();
        stages.extend(route.middleware());
        let chain = Chain::new(route, stages, Arc::new(ErrorPolicy::default()));
        self.register(method, &path, chain);
    }

    /// Shorthand for a plain `GET` endpoint.
    pub fn get<F>(&self, path: &str, handler: F)
    where
        F: Fn(&mut RequestContext) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.register_route(RouteDefinition::get(path, handler).into_route());
    }

    /// Attach router-level middleware.
    ///
    /// It runs ahead of every route registered on this router or any router
    /// mounted beneath it, whether that route was added before or after.
    pub fn use_middleware(&self, mw: Arc<dyn Middleware>) {
        self.write().middleware.push(mw);
    }

    /// Mount `child` under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MountSelf`] when `child` is this router.
    pub fn mount(&self, prefix: &str, child: &RouterNode) -> Result<(), RouterError> {
        if self.ptr_eq(child) {
            return Err(RouterError::MountSelf {
                prefix: prefix.to_string(),
            });
        }
        debug!(prefix = %prefix, "Router mounted");
        self.write().mounts.push((prefix.to_string(), child.clone()));
        Ok(())
    }

    /// Number of routes registered directly on this router.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.read().routes.len()
    }

    /// Every route reachable from this router, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Cycle`] when a router is mounted inside itself.
    pub fn routes(&self) -> Result<Vec<RouteSummary>, RouterError> {
        let mut entries = Vec::new();
        self.collect("", &[], &mut Vec::new(), &mut entries)?;
        Ok(entries
            .into_iter()
            .map(|e| RouteSummary {
                method: e.method.clone(),
                path: e.pattern.to_string(),
                full_path: e.chain.route().full_path().to_string(),
                stages: e.chain.stage_count(),
            })
            .collect())
    }

    /// Compile everything reachable from this router into a route table.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Cycle`] when a router is mounted inside itself.
    pub fn build(&self) -> Result<RouteTable, RouterError> {
        let mut entries = Vec::new();
        self.collect("", &[], &mut Vec::new(), &mut entries)?;
        let table = RouteTable::from_entries(entries);
        info!(routes = table.len(), "Route table built");
        Ok(table)
    }

    fn collect(
        &self,
        prefix: &str,
        inherited: &[Arc<dyn Middleware>],
        ancestors: &mut Vec<RouterNode>,
        out: &mut Vec<RouteEntry>,
    ) -> Result<(), RouterError> {
        if ancestors.iter().any(|a| a.ptr_eq(self)) {
            return Err(RouterError::Cycle {
                prefix: prefix.to_string(),
            });
        }

        let (routes, mounts, layers) = {
            let inner = self.read();
            let mut layers = inherited.to_vec();
            layers.extend(inner.middleware.iter().cloned());
            let routes: Vec<(Method, String, Arc<Chain>)> = inner
                .routes
                .iter()
                .map(|r| (r.method.clone(), r.path.clone(), Arc::clone(&r.chain)))
                .collect();
            (routes, inner.mounts.clone(), layers)
        };

        for (method, path, chain) in routes {
            out.push(RouteEntry {
                method,
                pattern: Arc::from(join_path(prefix, &path)),
                layers: layers.clone(),
                chain,
            });
        }

        ancestors.push(self.clone());
        for (child_prefix, child) in mounts {
            child.collect(&join_path(prefix, &child_prefix), &layers, ancestors, out)?;
        }
        ancestors.pop();
        Ok(())
    }
}

/// Join a mount prefix and a route path into one pattern.
#[must_use]
pub fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) if prefix.starts_with('/') => prefix.to_string(),
        (false, true) => format!("/{prefix}"),
        (false, false) if prefix.starts_with('/') => format!("{prefix}/{path}"),
        (false, false) => format!("/{prefix}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::SetRequestHeader;
    use crate::request::IncomingRequest;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "/"), "/");
        assert_eq!(join_path("", "/test"), "/test");
        assert_eq!(join_path("/v0", "/"), "/v0");
        assert_eq!(join_path("/v0/", "/test"), "/v0/test");
        assert_eq!(join_path("v0", "test"), "/v0/test");
    }

    #[test]
    fn test_mount_prefixes_child_routes() {
        let root = RouterNode::new();
        let v0 = RouterNode::new();
        v0.get("/test", |_ctx| Ok(Response::default()));
        root.mount("/v0", &v0).unwrap();

        let routes = root.routes().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/v0/test");
        assert_eq!(routes[0].full_path, "/test");
    }

    #[test]
    fn test_mount_self_is_rejected() {
        let root = RouterNode::new();
        assert!(matches!(
            root.mount("/loop", &root.clone()),
            Err(RouterError::MountSelf { .. })
        ));
    }

    #[test]
    fn test_cycle_is_reported_at_build() {
        let a = RouterNode::new();
        let b = RouterNode::new();
        a.mount("/b", &b).unwrap();
        b.mount("/a", &a).unwrap();
        assert!(matches!(a.build(), Err(RouterError::Cycle { .. })));
    }

    #[test]
    fn test_router_middleware_reaches_routes_added_later() {
        let root = RouterNode::new();
        root.use_middleware(Arc::new(SetRequestHeader::new("x-async-header", "1")));
        root.get("/echo", |ctx| {
            Ok(Response::plain(ctx.get_header("x-async-header").unwrap_or("").to_string()))
        });
        let table = root.build().unwrap();
        let res = table.dispatch(IncomingRequest::new("GET", "/echo"));
        assert_eq!(res.body, crate::response::Body::Text("1".to_string()));
    }

    #[test]
    fn test_parent_middleware_applies_to_mounted_children() {
        let root = RouterNode::new();
        let child = RouterNode::new();
        child.get("/inner", |ctx| {
            Ok(Response::plain(ctx.get_header("x-root").unwrap_or("missing").to_string()))
        });
        root.mount("/child", &child).unwrap();
        root.use_middleware(Arc::new(SetRequestHeader::new("x-root", "yes")));
        let table = root.build().unwrap();
        let res = table.dispatch(IncomingRequest::new("GET", "/child/inner"));
        assert_eq!(res.body, crate::response::Body::Text("yes".to_string()));
    }
}
