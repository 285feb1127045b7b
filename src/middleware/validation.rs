use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::Middleware;
use crate::policy::ErrorPolicy;
use crate::request::RequestContext;
use crate::response::Response;
use crate::schema::{CompiledSchema, Schema, Violation};

/// Request section a validation stage checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Section {
    Body,
    Query,
    Parameters,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Body => "BODY",
            Section::Query => "QUERY",
            Section::Parameters => "PARAMETERS",
        })
    }
}

/// Input that did not satisfy its section's schema.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    pub section: Section,
    pub errors: Vec<Violation>,
    pub schema: Schema,
}

/// Validates one request section and short-circuits through the
/// invalid-input handler on failure.
///
/// Coerced values are written back to the request, so later stages and the
/// handler see typed data. A missing body is validated as `{}` and stays
/// missing.
pub struct ValidationMiddleware {
    section: Section,
    schema: CompiledSchema,
    policy: Arc<ErrorPolicy>,
}

impl ValidationMiddleware {
    #[must_use]
    pub fn new(section: Section, schema: CompiledSchema, policy: Arc<ErrorPolicy>) -> Self {
        Self {
            section,
            schema,
            policy,
        }
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    fn check(&self, ctx: &mut RequestContext) -> Result<(), Vec<Violation>> {
        match self.section {
            Section::Body => match ctx.body.as_mut() {
                Some(body) => self.schema.validate(body),
                None => self.schema.validate(&mut Value::Object(Map::new())),
            },
            Section::Query => validate_map(&self.schema, &mut ctx.query),
            Section::Parameters => validate_map(&self.schema, &mut ctx.params),
        }
    }
}

fn validate_map(schema: &CompiledSchema, map: &mut Map<String, Value>) -> Result<(), Vec<Violation>> {
    let mut data = Value::Object(std::mem::take(map));
    let outcome = schema.validate(&mut data);
    if let Value::Object(coerced) = data {
        *map = coerced;
    }
    outcome
}

impl Middleware for ValidationMiddleware {
    fn before(&self, ctx: &mut RequestContext) -> anyhow::Result<Option<Response>> {
        match self.check(ctx) {
            Ok(()) => Ok(None),
            Err(errors) => {
                debug!(
                    request_id = %ctx.request_id,
                    section = %self.section,
                    route = %ctx.route,
                    violation_count = errors.len(),
                    "Request input rejected"
                );
                let failure = ValidationFailure {
                    section: self.section,
                    errors,
                    schema: self.schema.schema().clone(),
                };
                Ok(Some(self.policy.invalid_input(&failure, ctx)))
            }
        }
    }
}
