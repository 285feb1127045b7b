//! # kudy
//!
//! **kudy** loads HTTP routes from a directory tree by convention and serves them on the `may`
//! coroutine runtime through `may_minihttp`.
//!
//! ## Overview
//!
//! Every file in a route directory defines one endpoint. A directory's index entry can decorate
//! the router its files register on, for example by mounting a sub-router under a prefix or by
//! attaching router-level middleware. Routes may declare JSON Schemas for the request body, query
//! string and path parameters; inputs are coerced and validated before the handler runs, and every
//! failure is answered through a uniform, configurable error policy.
//!
//! ## Architecture
//!
//! - **[`loader`]** - Directory walking, index decorators and chain composition
//! - **[`module`]** - Module resolution: declarative manifests bound against a [`Registry`]
//! - **[`route`]** - The [`Route`] contract and the [`RouteDefinition`] builder
//! - **[`middleware`]** - Middleware trait, validation stages and request tracing
//! - **[`schema`]** - Schema compilation, type coercion and violations
//! - **[`policy`]** - Error-catch and invalid-input handlers
//! - **[`dispatcher`]** - Per-route middleware chain execution
//! - **[`router`]** - Router nodes with mounts, and the compiled radix route table
//! - **[`server`]** - `may_minihttp` service and server handle
//! - **[`config`]**, **[`logging`]**, **[`cli`]** - The `kudy` binary's ambient stack
//!
//! ### Request Flow
//!
//! ```text
//! wire request
//!   -> server::parse_request        (lower-cased headers, decoded query, JSON body)
//!   -> RouteTable::dispatch          (radix match, path params, request context)
//!   -> router-level middleware       (inherited from every router on the mount path)
//!   -> pre-middleware
//!   -> body / query / parameters validation
//!   -> route middleware
//!   -> handler
//!   -> Response envelope materialized onto the wire
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kudy::loader::RouteLoader;
//! use kudy::module::{ManifestResolver, Registry};
//! use kudy::router::RouterNode;
//! use kudy::server::{AppService, HttpServer};
//!
//! let mut registry = Registry::with_builtins();
//! registry.register_handler("hello", |_ctx| Ok(kudy::Response::plain("hello")));
//!
//! let loader = RouteLoader::new((), ManifestResolver::new(registry));
//! let root = RouterNode::new();
//! loader.append_routes_from_dir(&root, "./routes")?;
//!
//! let handle = HttpServer(AppService::new(root.build()?)).start("127.0.0.1:8080")?;
//! handle.join().ok();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod dispatcher;
mod echo;
pub mod error;
pub mod ids;
pub mod loader;
pub mod logging;
pub mod middleware;
pub mod module;
pub mod policy;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod schema;
pub mod server;

pub use echo::{echo_handler, empty_handler};
pub use error::{LoaderError, ResolveError};
pub use loader::{LoaderOptions, RouteLoader};
pub use module::{ManifestResolver, Module, ModuleResolver, Registry};
pub use policy::ErrorPolicy;
pub use request::{IncomingRequest, RequestContext};
pub use response::Response;
pub use route::{Route, RouteDefinition, RouteProvider};
pub use router::{RouteTable, RouterNode};
pub use schema::{Schema, SchemaValidator};
