mod core;
mod tracing;
mod validation;

pub use core::{middleware_fn, FnMiddleware, Middleware, SetRequestHeader};
pub use tracing::TracingMiddleware;
pub use validation::{Section, ValidationFailure, ValidationMiddleware};
