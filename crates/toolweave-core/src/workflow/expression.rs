//! JEXL evaluator for step conditions.
//!
//! Wraps `jexl_eval::Evaluator` with a few string/collection transforms.
//! Context values are always passed as a context object, never spliced into
//! the expression text.

use serde_json::{Value, json};

use super::context::WorkflowContext;

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("invalid context: {0}")]
    InvalidContext(String),
}

pub struct WorkflowEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl WorkflowEvaluator {
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            .with_transform("lower", |args: &[Value]| {
                Ok(json!(first_str(args).to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                Ok(json!(first_str(args).to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| Ok(json!(first_str(args).trim())))
            .with_transform("contains", |args: &[Value]| {
                let needle = args.get(1).cloned().unwrap_or(Value::Null);
                let found = match args.first() {
                    Some(Value::String(s)) => needle.as_str().is_some_and(|n| s.contains(n)),
                    Some(Value::Array(items)) => items.contains(&needle),
                    Some(Value::Object(map)) => {
                        needle.as_str().is_some_and(|k| map.contains_key(k))
                    }
                    _ => false,
                };
                Ok(json!(found))
            })
            .with_transform("startsWith", |args: &[Value]| {
                let prefix = args.get(1).and_then(Value::as_str).unwrap_or("");
                Ok(json!(first_str(args).starts_with(prefix)))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            });

        Self { evaluator }
    }

    /// Evaluate to a boolean using JavaScript-like truthiness.
    pub fn evaluate_bool(
        &self,
        expression: &str,
        context: &Value,
    ) -> Result<bool, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }
        let result = self
            .evaluator
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))?;
        Ok(is_truthy(&result))
    }

    /// Evaluate against `{ results, errors, variables, caller, workflow }`.
    pub fn evaluate_in_workflow_context(
        &self,
        expression: &str,
        ctx: &WorkflowContext,
    ) -> Result<bool, ExpressionError> {
        self.evaluate_bool(expression, &ctx.to_expression_context())
    }
}

impl Default for WorkflowEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn first_str(args: &[Value]) -> &str {
    args.first().and_then(Value::as_str).unwrap_or("")
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
