//! Runs a single workflow step through the tool registry.

use std::sync::Arc;

use serde_json::Value;

use toolweave_types::error::ToolError;
use toolweave_types::workflow::OnError;

use super::context::WorkflowContext;
use super::definition::WorkflowStep;
use crate::registry::ToolRegistry;

/// What one step produced.
#[derive(Debug, Clone)]
pub struct StepRun {
    pub step_id: String,
    pub result: Result<Value, ToolError>,
    /// Handler executions; 0 when the registry rejected the call up front.
    pub attempts: u32,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct StepRunner {
    registry: Arc<ToolRegistry>,
}

impl StepRunner {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the step's input against `ctx` and invoke its tool.
    ///
    /// `on_error: retry` routes the call through the retry engine with the
    /// step's policy; every other mode makes exactly one attempt.
    pub async fn run(&self, step: &WorkflowStep, ctx: &WorkflowContext) -> StepRun {
        let input = step.input.resolve(ctx);
        let retry = match step.on_error {
            OnError::Retry => Some(step.retry_policy.as_deref()),
            OnError::Fail | OnError::Continue => None,
        };

        tracing::debug!(
            run_id = %ctx.run_id,
            step_id = step.id.as_str(),
            tool = step.tool.as_str(),
            retry = retry.is_some(),
            "running step"
        );

        let started = tokio::time::Instant::now();
        let (result, attempts) = self
            .registry
            .run_counted(&step.tool, input, &ctx.caller, retry)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (result, warnings) = match result {
            Ok(invocation) => (Ok(invocation.output), invocation.warnings),
            Err(err) => (Err(err), Vec::new()),
        };

        StepRun {
            step_id: step.id.clone(),
            result,
            attempts,
            duration_ms,
            warnings,
        }
    }
}
