//! # Router Module
//!
//! Route registration and path matching.
//!
//! ## Overview
//!
//! Routing happens in two phases:
//!
//! 1. **Registration**: routes, router-level middleware and sub-routers are
//!    added to a [`RouterNode`]. Nodes are cheap shareable handles, so the
//!    loader and directory decorators can all write to the same router.
//!
//! 2. **Compilation**: [`RouterNode::build`] flattens the mount tree into a
//!    [`RouteTable`], a method-keyed radix tree matched in O(k) in the
//!    number of path segments. The table is immutable and shared between
//!    connections.
//!
//! ## Example
//!
//! ```rust
//! use kudy::request::IncomingRequest;
//! use kudy::response::Response;
//! use kudy::router::RouterNode;
//!
//! let root = RouterNode::new();
//! let v0 = RouterNode::new();
//! v0.get("/users/:id", |ctx| {
//!     Ok(Response::plain(ctx.path_param("id").map(|v| v.to_string()).unwrap_or_default()))
//! });
//! root.mount("/v0", &v0).unwrap();
//!
//! let table = root.build().unwrap();
//! let res = table.dispatch(IncomingRequest::new("GET", "/v0/users/42"));
//! assert_eq!(res.status, 200);
//! ```

mod core;
mod node;
mod radix;

use smallvec::SmallVec;
use std::sync::Arc;

pub use core::{not_found, RouteEntry, RouteMatch, RouteTable};
pub use node::{join_path, RouteSummary, RouterNode};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names come from the route tree and are shared; values are
/// per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Router composition errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("cannot mount a router inside itself at {prefix:?}")]
    MountSelf { prefix: String },

    #[error("router mount cycle detected at {prefix:?}")]
    Cycle { prefix: String },
}
