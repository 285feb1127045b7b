//! Fallback handling for request-time failures.
//!
//! Every route chain carries an [`ErrorPolicy`] with two handlers: one for
//! uncaught errors (including panics) raised anywhere in the chain, and one
//! for input that failed schema validation. Both turn the failure into a
//! regular [`Response`], so a single failing request never takes a
//! connection down with it.

use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

use crate::middleware::ValidationFailure;
use crate::request::RequestContext;
use crate::response::Response;

/// Turns an uncaught error into a response.
pub type ErrorCatchHandler =
    Arc<dyn Fn(&anyhow::Error, &RequestContext) -> Response + Send + Sync>;

/// Turns a validation failure into a response.
pub type InvalidInputHandler =
    Arc<dyn Fn(&ValidationFailure, &RequestContext) -> Response + Send + Sync>;

/// `500 {error: "SERVER_ERROR", error_description, error_stack}`.
#[must_use]
pub fn default_error_catch_handler(err: &anyhow::Error, _ctx: &RequestContext) -> Response {
    Response::json(json!({
        "error": "SERVER_ERROR",
        "error_description": err.to_string(),
        "error_stack": format!("{err:?}"),
    }))
    .with_status(500)
}

/// `422 {error: "INVALID_INPUT", error_description, error_validation: {errors, schema}}`.
#[must_use]
pub fn default_invalid_input_handler(
    failure: &ValidationFailure,
    _ctx: &RequestContext,
) -> Response {
    Response::json(json!({
        "error": "INVALID_INPUT",
        "error_description": format!(
            "Input data in {} section are wrong or missing",
            failure.section
        ),
        "error_validation": {
            "errors": failure.errors,
            "schema": failure.schema,
        },
    }))
    .with_status(422)
}

/// The pair of fallback handlers shared by the routes of one loader.
#[derive(Clone)]
pub struct ErrorPolicy {
    error_catch: ErrorCatchHandler,
    invalid_input: InvalidInputHandler,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            error_catch: Arc::new(default_error_catch_handler),
            invalid_input: Arc::new(default_invalid_input_handler),
        }
    }
}

impl std::fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorPolicy").finish_non_exhaustive()
    }
}

impl ErrorPolicy {
    /// Build a policy, using the defaults for handlers that are not supplied.
    #[must_use]
    pub fn new(
        error_catch: Option<ErrorCatchHandler>,
        invalid_input: Option<InvalidInputHandler>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            error_catch: error_catch.unwrap_or(defaults.error_catch),
            invalid_input: invalid_input.unwrap_or(defaults.invalid_input),
        }
    }

    /// Run the error-catch handler.
    ///
    /// A panicking handler yields a fixed JSON 500.
    #[must_use]
    pub fn handle_error(&self, err: &anyhow::Error, ctx: &RequestContext) -> Response {
        error!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            error = %err,
            "Uncaught error in route chain"
        );
        catch_unwind(AssertUnwindSafe(|| (self.error_catch)(err, ctx)))
            .unwrap_or_else(|_| fallback_failure(ctx, "error-catch handler panicked"))
    }

    /// Run the invalid-input handler.
    #[must_use]
    pub fn invalid_input(&self, failure: &ValidationFailure, ctx: &RequestContext) -> Response {
        catch_unwind(AssertUnwindSafe(|| (self.invalid_input)(failure, ctx)))
            .unwrap_or_else(|_| fallback_failure(ctx, "invalid-input handler panicked"))
    }
}

fn fallback_failure(ctx: &RequestContext, reason: &str) -> Response {
    error!(
        request_id = %ctx.request_id,
        path = %ctx.path,
        reason = reason,
        "Fallback handler failed"
    );
    Response::json(json!({
        "error": "SERVER_ERROR",
        "error_description": reason,
    }))
    .with_status(500)
}
