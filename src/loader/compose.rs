use std::sync::Arc;

use crate::dispatcher::Chain;
use crate::error::LoaderError;
use crate::middleware::{Middleware, Section, ValidationMiddleware};
use crate::policy::ErrorPolicy;
use crate::route::Route;
use crate::schema::{Schema, SchemaValidator};

/// Builds the per-route middleware chain.
///
/// Stage order is fixed: pre-middleware, body validation, query validation,
/// parameters validation, then the route's own middleware. Schemas are
/// compiled here, once per route.
#[derive(Debug, Clone)]
pub struct MiddlewareComposer {
    validator: SchemaValidator,
    policy: Arc<ErrorPolicy>,
}

impl MiddlewareComposer {
    #[must_use]
    pub fn new(validator: SchemaValidator, policy: Arc<ErrorPolicy>) -> Self {
        Self { validator, policy }
    }

    /// Compose the chain for `route`.
    ///
    /// # Errors
    ///
    /// [`LoaderError::InvalidSchema`] when a declared schema does not compile.
    pub fn chain(&self, route: Arc<dyn Route>) -> Result<Chain, LoaderError> {
        let mut stages: Vec<Arc<dyn Middleware>> = route.pre_middleware();

        let sections = [
            (Section::Body, route.body_schema()),
            (Section::Query, route.query_schema()),
            (Section::Parameters, route.parameters_schema()),
        ];
        for (section, schema) in sections {
            if let Some(schema) = schema {
                stages.push(self.validation_stage(route.as_ref(), section, schema)?);
            }
        }

        stages.extend(route.middleware());
        Ok(Chain::new(route, stages, Arc::clone(&self.policy)))
    }

    fn validation_stage(
        &self,
        route: &dyn Route,
        section: Section,
        schema: &Schema,
    ) -> Result<Arc<dyn Middleware>, LoaderError> {
        let compiled = self
            .validator
            .compile(schema)
            .map_err(|e| LoaderError::InvalidSchema {
                method: route.method().to_string(),
                route: route.full_path().to_string(),
                section,
                message: e.message,
            })?;
        Ok(Arc::new(ValidationMiddleware::new(
            section,
            compiled,
            Arc::clone(&self.policy),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::SetRequestHeader;
    use crate::request::RequestContext;
    use crate::response::Response;
    use crate::route::RouteDefinition;
    use http::Method;
    use serde_json::json;

    fn composer() -> MiddlewareComposer {
        MiddlewareComposer::new(SchemaValidator::default(), Arc::new(ErrorPolicy::default()))
    }

    fn header_echo(ctx: &mut RequestContext) -> anyhow::Result<Response> {
        Ok(Response::plain(ctx.get_header("x-order").unwrap_or("").to_string()))
    }

    #[test]
    fn test_stage_count_includes_validators() {
        let route = RouteDefinition::post("/body", |_ctx| Ok(Response::default()))
            .with_body_schema(json!({"type": "object"}))
            .with_query_schema(json!({"type": "object"}))
            .with_pre_middleware(Arc::new(SetRequestHeader::new("x-pre", "1")))
            .with_middleware(Arc::new(SetRequestHeader::new("x-post", "1")))
            .into_route();
        let chain = composer().chain(route).unwrap();
        assert_eq!(chain.stage_count(), 4);
    }

    #[test]
    fn test_pre_middleware_runs_before_validation() {
        let route = RouteDefinition::get("/q", header_echo)
            .with_query_schema(json!({
                "type": "object",
                "properties": {"id": {"type": "integer"}},
                "required": ["id"]
            }))
            .with_pre_middleware(Arc::new(SetRequestHeader::new("x-order", "pre")))
            .into_route();
        let chain = composer().chain(route).unwrap();

        let mut ctx = RequestContext::new(Method::GET, "/q");
        let res = chain.run(&[], &mut ctx);
        assert_eq!(res.status, 422);
        assert_eq!(ctx.get_header("x-order"), Some("pre"));
    }

    #[test]
    fn test_user_middleware_runs_after_validation() {
        let route = RouteDefinition::post("/b", header_echo)
            .with_body_schema(json!({"type": "object", "required": ["id"]}))
            .with_middleware(Arc::new(SetRequestHeader::new("x-order", "user")))
            .into_route();
        let chain = composer().chain(route).unwrap();

        let mut ctx = RequestContext::new(Method::POST, "/b");
        ctx.body = Some(json!({}));
        assert_eq!(chain.run(&[], &mut ctx).status, 422);
        assert_eq!(ctx.get_header("x-order"), None);

        let mut ctx = RequestContext::new(Method::POST, "/b");
        ctx.body = Some(json!({"id": 1}));
        let res = chain.run(&[], &mut ctx);
        assert_eq!(res.status, 200);
        assert_eq!(res.to_buffered().text(), "user");
    }

    #[test]
    fn test_invalid_schema_fails_composition() {
        let route = RouteDefinition::get("/bad", |_ctx| Ok(Response::default()))
            .with_parameters_schema(json!({"type": "not-a-type"}))
            .into_route();
        let Err(err) = composer().chain(route) else {
            panic!("expected a schema error");
        };
        assert!(matches!(
            err,
            LoaderError::InvalidSchema {
                section: Section::Parameters,
                ..
            }
        ));
    }
}
