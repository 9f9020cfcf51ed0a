//! Structural validation of JSON values against declared tool shapes.
//!
//! Supports the subset of JSON Schema that tool descriptors actually use:
//! `type` (single name or list), `properties`, `required`,
//! `additionalProperties` (boolean), `items`, `enum`, `minimum`, `maximum`,
//! `minLength`, `maxLength`, `minItems`, `maxItems`. Unknown keywords are
//! ignored so descriptors written for fuller validators still load.

use std::fmt;

use serde_json::{Map, Value};

const TYPE_NAMES: &[&str] = &[
    "string", "number", "integer", "boolean", "object", "array", "null",
];

const LENGTH_KEYWORDS: &[&str] = &["minLength", "maxLength", "minItems", "maxItems"];

/// One mismatch between a value and its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON path to the offending value, e.g. `$.user.tags[2]`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Join violations into a single diagnostic line.
pub fn describe_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Schema well-formedness
// ---------------------------------------------------------------------------

/// Reject schemas the validator cannot interpret.
///
/// Called at registration time so malformed shapes never reach invocation.
pub fn check_schema(schema: &Value) -> Result<(), String> {
    check_schema_at(schema, "$")
}

fn check_schema_at(schema: &Value, path: &str) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| format!("{path}: schema must be an object"))?;

    if let Some(ty) = obj.get("type") {
        match ty {
            Value::String(name) => check_type_name(name, path)?,
            Value::Array(names) if !names.is_empty() => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| format!("{path}: 'type' list entries must be strings"))?;
                    check_type_name(name, path)?;
                }
            }
            _ => return Err(format!("{path}: 'type' must be a string or non-empty list")),
        }
    }

    if let Some(required) = obj.get("required") {
        let ok = required
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !ok {
            return Err(format!("{path}: 'required' must be an array of strings"));
        }
    }

    if let Some(props) = obj.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| format!("{path}: 'properties' must be an object"))?;
        for (key, sub) in props {
            check_schema_at(sub, &format!("{path}.{key}"))?;
        }
    }

    if let Some(items) = obj.get("items") {
        check_schema_at(items, &format!("{path}[]"))?;
    }

    if let Some(additional) = obj.get("additionalProperties") {
        if !additional.is_boolean() {
            return Err(format!("{path}: 'additionalProperties' must be a boolean"));
        }
    }

    if let Some(values) = obj.get("enum") {
        if !values.is_array() {
            return Err(format!("{path}: 'enum' must be an array"));
        }
    }

    for keyword in ["minimum", "maximum"] {
        if let Some(bound) = obj.get(keyword) {
            if !bound.is_number() {
                return Err(format!("{path}: '{keyword}' must be a number"));
            }
        }
    }

    for keyword in LENGTH_KEYWORDS {
        if let Some(bound) = obj.get(*keyword) {
            if bound.as_u64().is_none() {
                return Err(format!("{path}: '{keyword}' must be a non-negative integer"));
            }
        }
    }

    Ok(())
}

fn check_type_name(name: &str, path: &str) -> Result<(), String> {
    if TYPE_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(format!("{path}: unknown type '{name}'"))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate `value` against `schema`, collecting every violation.
///
/// An empty schema (`{}`) accepts any value.
pub fn validate(schema: &Value, value: &Value) -> Result<(), Vec<SchemaViolation>> {
    let mut violations = Vec::new();
    validate_at(schema, value, "$", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn validate_at(schema: &Value, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let Some(obj) = schema.as_object() else {
        return;
    };

    if let Some(ty) = obj.get("type") {
        let allowed: Vec<&str> = match ty {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|name| matches_type(name, value)) {
            out.push(violation(
                path,
                format!("expected {}, got {}", allowed.join(" or "), type_of(value)),
            ));
            // Deeper keywords only make sense once the type matches.
            return;
        }
    }

    if let Some(Value::Array(options)) = obj.get("enum") {
        if !options.contains(value) {
            out.push(violation(path, format!("value {value} is not one of the allowed values")));
        }
    }

    match value {
        Value::Object(map) => validate_object(obj, map, path, out),
        Value::Array(items) => validate_array(obj, items, path, out),
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = obj.get("minLength").and_then(Value::as_u64) {
                if len < min {
                    out.push(violation(path, format!("string shorter than {min}")));
                }
            }
            if let Some(max) = obj.get("maxLength").and_then(Value::as_u64) {
                if len > max {
                    out.push(violation(path, format!("string longer than {max}")));
                }
            }
        }
        Value::Number(n) => {
            let Some(x) = n.as_f64() else { return };
            if let Some(min) = obj.get("minimum").and_then(Value::as_f64) {
                if x < min {
                    out.push(violation(path, format!("{x} is below minimum {min}")));
                }
            }
            if let Some(max) = obj.get("maximum").and_then(Value::as_f64) {
                if x > max {
                    out.push(violation(path, format!("{x} is above maximum {max}")));
                }
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
}

fn validate_object(
    schema: &Map<String, Value>,
    map: &Map<String, Value>,
    path: &str,
    out: &mut Vec<SchemaViolation>,
) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(key) {
                out.push(violation(path, format!("missing required property '{key}'")));
            }
        }
    }

    let props = schema.get("properties").and_then(Value::as_object);
    if let Some(props) = props {
        for (key, sub_schema) in props {
            if let Some(sub_value) = map.get(key) {
                validate_at(sub_schema, sub_value, &format!("{path}.{key}"), out);
            }
        }
    }

    if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
        for key in map.keys() {
            if !props.is_some_and(|p| p.contains_key(key)) {
                out.push(violation(path, format!("unexpected property '{key}'")));
            }
        }
    }
}

fn validate_array(
    schema: &Map<String, Value>,
    items: &[Value],
    path: &str,
    out: &mut Vec<SchemaViolation>,
) {
    let len = items.len() as u64;
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if len < min {
            out.push(violation(path, format!("expected at least {min} items, got {len}")));
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if len > max {
            out.push(violation(path, format!("expected at most {max} items, got {len}")));
        }
    }
    if let Some(item_schema) = schema.get("items") {
        for (i, item) in items.iter().enumerate() {
            validate_at(item_schema, item, &format!("{path}[{i}]"), out);
        }
    }
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn violation(path: &str, message: String) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message,
    }
}
