//! Primitive type coercion ahead of validation.
//!
//! Query strings and path segments only ever carry strings, so `?id=1` must be
//! turned into the number `1` before a `type: integer` keyword sees it.
//! Coercion acts at every `type` keyword reachable from the root: through
//! `properties`, `patternProperties`, `additionalProperties` and `items`,
//! through local `$ref`s, and through `allOf`, `anyOf`, `oneOf` and
//! `if`/`then`/`else`. Values that cannot be coerced are left untouched for
//! the validator to reject.
//!
//! `anyOf`, `oneOf` and `then`/`else` take the first branch whose type
//! accepts the coerced value. Subschemas under `not` are never used to coerce.

use regex::Regex;
use serde_json::{Map, Number, Value};

/// Coerce `data` in place towards the types `schema` declares.
pub fn coerce(schema: &Value, data: &mut Value) {
    Coercer { root: schema }.apply(schema, data, &mut Vec::new());
}

/// Walks one schema document. `refs` holds the `$ref`s being expanded at the
/// current data location; it is reset whenever the walk descends into data.
struct Coercer<'s> {
    root: &'s Value,
}

impl<'s> Coercer<'s> {
    fn apply(&self, schema: &'s Value, data: &mut Value, refs: &mut Vec<&'s str>) {
        let Some(schema) = schema.as_object() else {
            return;
        };

        if let Some(Value::String(reference)) = schema.get("$ref") {
            if !refs.contains(&reference.as_str()) {
                if let Some(target) = self.resolve(reference) {
                    refs.push(reference);
                    self.apply(target, data, refs);
                    refs.pop();
                }
            }
        }

        if let Some(types) = declared_types(schema) {
            if !types.iter().any(|ty| matches_type(ty, data)) {
                for ty in &types {
                    if let Some(coerced) = coerce_scalar(ty, data) {
                        *data = coerced;
                        break;
                    }
                }
            }
        }

        if let Some(Value::Array(branches)) = schema.get("allOf") {
            for branch in branches {
                self.apply(branch, data, refs);
            }
        }
        for keyword in ["anyOf", "oneOf"] {
            if let Some(Value::Array(branches)) = schema.get(keyword) {
                self.apply_first_accepting(branches.iter(), data, refs);
            }
        }
        if let Some(condition) = schema.get("if") {
            self.apply(condition, data, refs);
            let outcomes = ["then", "else"].into_iter().filter_map(|k| schema.get(k));
            self.apply_first_accepting(outcomes, data, refs);
        }

        match data {
            Value::Object(fields) => self.apply_fields(schema, fields),
            Value::Array(elements) => match schema.get("items") {
                Some(Value::Array(tuple)) => {
                    for (item_schema, element) in tuple.iter().zip(elements.iter_mut()) {
                        self.apply(item_schema, element, &mut Vec::new());
                    }
                }
                Some(item_schema) => {
                    for element in elements.iter_mut() {
                        self.apply(item_schema, element, &mut Vec::new());
                    }
                }
                None => {}
            },
            _ => {}
        }
    }

    fn apply_fields(&self, schema: &'s Map<String, Value>, fields: &mut Map<String, Value>) {
        let properties = schema.get("properties").and_then(Value::as_object);
        let patterns: Vec<(Regex, &'s Value)> = schema
            .get("patternProperties")
            .and_then(Value::as_object)
            .map(|patterns| {
                patterns
                    .iter()
                    .filter_map(|(pattern, s)| Regex::new(pattern).ok().map(|re| (re, s)))
                    .collect()
            })
            .unwrap_or_default();
        let additional = schema
            .get("additionalProperties")
            .filter(|s| s.is_object());

        for (name, value) in fields.iter_mut() {
            let mut matched = false;
            if let Some(property_schema) = properties.and_then(|p| p.get(name)) {
                self.apply(property_schema, value, &mut Vec::new());
                matched = true;
            }
            for (re, pattern_schema) in &patterns {
                if re.is_match(name) {
                    self.apply(pattern_schema, value, &mut Vec::new());
                    matched = true;
                }
            }
            if !matched {
                if let Some(additional) = additional {
                    self.apply(additional, value, &mut Vec::new());
                }
            }
        }
    }

    /// Coerce through the first branch whose declared type accepts the result.
    fn apply_first_accepting(
        &self,
        branches: impl Iterator<Item = &'s Value>,
        data: &mut Value,
        refs: &mut Vec<&'s str>,
    ) {
        for branch in branches {
            let mut candidate = data.clone();
            self.apply(branch, &mut candidate, refs);
            if self.accepts(branch, &candidate, &mut refs.clone()) {
                *data = candidate;
                return;
            }
        }
    }

    fn accepts(&self, schema: &'s Value, data: &Value, refs: &mut Vec<&'s str>) -> bool {
        let Some(schema) = schema.as_object() else {
            return true;
        };
        if let Some(types) = declared_types(schema) {
            return types.iter().any(|ty| matches_type(ty, data));
        }
        match schema.get("$ref") {
            Some(Value::String(reference)) if !refs.contains(&reference.as_str()) => {
                match self.resolve(reference) {
                    Some(target) => {
                        refs.push(reference);
                        self.accepts(target, data, refs)
                    }
                    None => true,
                }
            }
            _ => true,
        }
    }

    /// Resolve a same-document reference such as `#/definitions/Id`.
    fn resolve(&self, reference: &str) -> Option<&'s Value> {
        let fragment = reference.strip_prefix('#')?;
        if fragment.is_empty() {
            return Some(self.root);
        }
        let pointer = urlencoding::decode(fragment).ok()?;
        self.root.pointer(&pointer)
    }
}

fn declared_types(schema: &Map<String, Value>) -> Option<Vec<&str>> {
    match schema.get("type")? {
        Value::String(ty) => Some(vec![ty.as_str()]),
        Value::Array(types) => Some(types.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

fn matches_type(ty: &str, value: &Value) -> bool {
    match ty {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => is_integral(value),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}

fn coerce_scalar(ty: &str, value: &Value) -> Option<Value> {
    match ty {
        "string" => match value {
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            Value::Null => Some(Value::String(String::new())),
            _ => None,
        },
        "number" => match value {
            Value::String(s) => parse_number(s).map(Value::Number),
            Value::Bool(b) => Some(Value::from(u8::from(*b))),
            Value::Null => Some(Value::from(0)),
            _ => None,
        },
        "integer" => match value {
            Value::String(s) => parse_integer(s).map(Value::from),
            Value::Bool(b) => Some(Value::from(u8::from(*b))),
            Value::Null => Some(Value::from(0)),
            _ => None,
        },
        "boolean" => match value {
            Value::String(s) if s == "true" => Some(Value::Bool(true)),
            Value::String(s) if s == "false" => Some(Value::Bool(false)),
            Value::Number(n) if n.as_f64() == Some(1.0) => Some(Value::Bool(true)),
            Value::Number(n) if n.as_f64() == Some(0.0) => Some(Value::Bool(false)),
            Value::Null => Some(Value::Bool(false)),
            _ => None,
        },
        "null" => match value {
            Value::String(s) if s.is_empty() => Some(Value::Null),
            Value::Number(n) if n.as_f64() == Some(0.0) => Some(Value::Null),
            Value::Bool(false) => Some(Value::Null),
            _ => None,
        },
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i);
    }
    let f = parse_number(trimmed)?.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
