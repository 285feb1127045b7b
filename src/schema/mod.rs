//! # Schema Module
//!
//! JSON Schema compilation and validation for request sections.
//!
//! Schemas are opaque [`Schema`] handles supplied by route definitions. A
//! [`SchemaValidator`] compiles them once at load time into a
//! [`CompiledSchema`], which validates request data on every call. The
//! validator coerces primitive strings (`"1"`, `"true"`) into the types the
//! schema declares before checking, because query and path parameters never
//! arrive as anything but strings.
//!
//! ```rust
//! use kudy::schema::{Schema, SchemaValidator};
//! use serde_json::json;
//!
//! let schema = Schema::new(json!({
//!     "type": "object",
//!     "properties": {"id": {"type": "integer"}},
//!     "required": ["id"]
//! }));
//! let compiled = SchemaValidator::default().compile(&schema).unwrap();
//!
//! let mut query = json!({"id": "1"});
//! assert!(compiled.validate(&mut query).is_ok());
//! assert_eq!(query, json!({"id": 1}));
//!
//! let mut bad = json!({"id": "string"});
//! assert!(compiled.validate(&mut bad).is_err());
//! ```

mod coerce;

pub use coerce::coerce;

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque, cheaply cloneable JSON Schema document.
#[derive(Clone, PartialEq)]
pub struct Schema(Arc<Value>);

impl Schema {
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self(Arc::new(document))
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Schema {
    fn from(document: Value) -> Self {
        Self::new(document)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({})", self.0)
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// JSON Schema draft used to interpret schema documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaDraft {
    Draft4,
    Draft6,
    #[default]
    Draft7,
    Draft201909,
    Draft202012,
}

impl SchemaDraft {
    fn engine(self) -> jsonschema::Draft {
        match self {
            SchemaDraft::Draft4 => jsonschema::Draft::Draft4,
            SchemaDraft::Draft6 => jsonschema::Draft::Draft6,
            SchemaDraft::Draft7 => jsonschema::Draft::Draft7,
            SchemaDraft::Draft201909 => jsonschema::Draft::Draft201909,
            SchemaDraft::Draft202012 => jsonschema::Draft::Draft202012,
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// JSON pointer to the offending value (empty for the root)
    pub instance_path: String,
    /// JSON pointer to the schema keyword that failed
    pub schema_path: String,
    /// The failing keyword, e.g. `type` or `required`
    pub keyword: String,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// A schema document the engine refused to compile.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SchemaError {
    pub message: String,
}

/// Compiles schemas. One instance is owned by each loader.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator {
    draft: SchemaDraft,
    coerce_types: bool,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self {
            draft: SchemaDraft::default(),
            coerce_types: true,
        }
    }
}

impl SchemaValidator {
    #[must_use]
    pub fn new(draft: SchemaDraft) -> Self {
        Self {
            draft,
            ..Self::default()
        }
    }

    /// Disable string to primitive coercion.
    #[must_use]
    pub fn without_coercion(mut self) -> Self {
        self.coerce_types = false;
        self
    }

    /// Compile a schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the document is not a valid schema for
    /// the configured draft.
    pub fn compile(&self, schema: &Schema) -> Result<CompiledSchema, SchemaError> {
        let validator = jsonschema::options()
            .with_draft(self.draft.engine())
            .build(schema.as_value())
            .map_err(|e| SchemaError {
                message: e.to_string(),
            })?;
        Ok(CompiledSchema {
            schema: schema.clone(),
            validator: Arc::new(validator),
            coerce_types: self.coerce_types,
        })
    }
}

/// A compiled schema, shared by every request that hits its route.
#[derive(Clone)]
pub struct CompiledSchema {
    schema: Schema,
    validator: Arc<jsonschema::Validator>,
    coerce_types: bool,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .field("coerce_types", &self.coerce_types)
            .finish()
    }
}

impl CompiledSchema {
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Coerce `data` in place, then validate it.
    ///
    /// # Errors
    ///
    /// Returns every violation found, in the order the engine reports them.
    pub fn validate(&self, data: &mut Value) -> Result<(), Vec<Violation>> {
        if self.coerce_types {
            coerce(self.schema.as_value(), data);
        }
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(data)
            .map(|e| {
                let schema_path = e.schema_path.to_string();
                let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
                Violation {
                    instance_path: e.instance_path.to_string(),
                    schema_path,
                    keyword,
                    message: e.to_string(),
                }
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id_schema(ty: &str) -> Schema {
        Schema::new(json!({
            "type": "object",
            "properties": {"id": {"type": ty}},
            "required": ["id"]
        }))
    }

    #[test]
    fn test_valid_body_is_unchanged() {
        let compiled = SchemaValidator::default()
            .compile(&id_schema("integer"))
            .unwrap();
        let mut body = json!({"id": 1});
        assert!(compiled.validate(&mut body).is_ok());
        assert_eq!(body, json!({"id": 1}));
    }

    #[test]
    fn test_missing_required_reports_violation() {
        let compiled = SchemaValidator::default()
            .compile(&id_schema("integer"))
            .unwrap();
        let mut body = json!({});
        let violations = compiled.validate(&mut body).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].schema_path.ends_with("required"));
        assert_eq!(violations[0].keyword, "required");
        assert!(violations[0].message.contains("id"));
    }

    #[test]
    fn test_type_mismatch_points_at_property() {
        let compiled = SchemaValidator::default()
            .compile(&id_schema("number"))
            .unwrap();
        let mut query = json!({"id": "abc"});
        let violations = compiled.validate(&mut query).unwrap_err();
        assert_eq!(violations[0].instance_path, "/id");
        assert_eq!(violations[0].keyword, "type");
    }

    #[test]
    fn test_without_coercion_rejects_numeric_string() {
        let compiled = SchemaValidator::default()
            .without_coercion()
            .compile(&id_schema("integer"))
            .unwrap();
        let mut query = json!({"id": "1"});
        assert!(compiled.validate(&mut query).is_err());
    }

    #[test]
    fn test_invalid_schema_fails_to_compile() {
        let schema = Schema::new(json!({"type": "no-such-type"}));
        assert!(SchemaValidator::default().compile(&schema).is_err());
    }

    #[test]
    fn test_violation_serializes_camel_case() {
        let v = Violation {
            instance_path: "/id".to_string(),
            schema_path: "/properties/id/type".to_string(),
            keyword: "type".to_string(),
            message: "\"x\" is not of type \"integer\"".to_string(),
        };
        let out = serde_json::to_value(&v).unwrap();
        assert_eq!(out["instancePath"], "/id");
        assert_eq!(out["schemaPath"], "/properties/id/type");
        assert_eq!(out["keyword"], "type");
    }
}
