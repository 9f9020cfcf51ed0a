//! Per-run workflow state and template resolution.
//!
//! A `WorkflowContext` is created fresh for each run and owned by that run.
//! Parallel steps receive a snapshot; their results are written back by the
//! executor one at a time, so no locking is needed here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use toolweave_types::error::ToolError;
use toolweave_types::tool::CallerContext;

#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub caller: CallerContext,
    /// Initial input supplied by whoever started the run.
    pub variables: Value,
    /// Outputs of steps that ran successfully, keyed by step id.
    pub results: BTreeMap<String, Value>,
    /// Errors of steps that failed, keyed by step id.
    pub errors: BTreeMap<String, ToolError>,
    pub started_at: DateTime<Utc>,
}

impl WorkflowContext {
    pub fn new(
        workflow_name: impl Into<String>,
        run_id: Uuid,
        caller: CallerContext,
        variables: Value,
    ) -> Self {
        Self {
            run_id,
            workflow_name: workflow_name.into(),
            caller,
            variables,
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    /// Output of `step_id`, or `None` if it was skipped, failed, or has not run.
    pub fn result(&self, step_id: &str) -> Option<&Value> {
        self.results.get(step_id)
    }

    pub fn error(&self, step_id: &str) -> Option<&ToolError> {
        self.errors.get(step_id)
    }

    pub fn record_result(&mut self, step_id: &str, output: Value) {
        self.results.insert(step_id.to_string(), output);
    }

    pub fn record_error(&mut self, step_id: &str, error: ToolError) {
        self.errors.insert(step_id.to_string(), error);
    }

    /// JSON object handed to condition expressions.
    pub fn to_expression_context(&self) -> Value {
        let errors: Map<String, Value> = self
            .errors
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.to_string())))
            .collect();
        json!({
            "results": self.results,
            "errors": errors,
            "variables": self.variables,
            "caller": self.caller,
            "workflow": {
                "name": self.workflow_name,
                "run_id": self.run_id.to_string(),
            },
        })
    }

    /// Serializable snapshot for reporting.
    pub fn to_json(&self) -> Value {
        let mut value = self.to_expression_context();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("started_at".into(), json!(self.started_at.to_rfc3339()));
        }
        value
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// Substitute `{{ results.<step>[.<path>] }}` and `{{ variables.<path> }}`
    /// in every string leaf of `template`.
    ///
    /// A string consisting of exactly one placeholder is replaced by the
    /// referenced JSON value (or `null` if missing). Placeholders embedded in
    /// longer text are interpolated as text; unknown ones are left as-is.
    pub fn resolve_template(&self, template: &Value) -> Value {
        match template {
            Value::String(s) => self.resolve_string(s),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.resolve_template(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_template(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_string(&self, s: &str) -> Value {
        let trimmed = s.trim();
        if let Some(inner) = whole_placeholder(trimmed) {
            return self.lookup(inner).cloned().unwrap_or(Value::Null);
        }

        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start..].find("}}") else {
                break;
            };
            let end = start + len + 2;
            out.push_str(&rest[..start]);
            let expr = rest[start + 2..end - 2].trim();
            match self.lookup(expr) {
                Some(value) => out.push_str(&value_to_text(value)),
                None => out.push_str(&rest[start..end]),
            }
            rest = &rest[end..];
        }
        out.push_str(rest);
        Value::String(out)
    }

    /// Resolve a dotted reference such as `results.fetch.items.0.title`.
    pub fn lookup(&self, reference: &str) -> Option<&Value> {
        let mut segments = reference.split('.');
        let root = segments.next()?;
        let mut current = match root {
            "results" => self.results.get(segments.next()?)?,
            "variables" => &self.variables,
            _ => return None,
        };
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// `{{ expr }}` with nothing else around it.
fn whole_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether any string leaf of `value` contains a `{{ .. }}` placeholder.
pub fn contains_placeholder(value: &Value) -> bool {
    match value {
        Value::String(s) => s.find("{{").is_some_and(|i| s[i..].contains("}}")),
        Value::Array(items) => items.iter().any(contains_placeholder),
        Value::Object(map) => map.values().any(contains_placeholder),
        _ => false,
    }
}
