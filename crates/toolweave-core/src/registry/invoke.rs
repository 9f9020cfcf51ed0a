//! Invocation pipeline.
//!
//! Every call goes through the same ordered checks:
//! existence -> enabled -> permissions -> input shape -> dependencies ->
//! execution (optionally retried) -> output shape (warn only) -> deprecation.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use toolweave_types::error::ToolError;
use toolweave_types::retry::DEFAULT_POLICY_NAME;
use toolweave_types::tool::{CallerContext, ToolDescriptor};

use super::catalog::{ToolFlags, ToolRegistry, latest};
use crate::retry::{FallbackError, run_with_policy, with_fallback};
use crate::schema::{describe_violations, validate};

/// Output of a successful call plus what it took to produce it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub tool: String,
    pub version: String,
    pub output: Value,
    pub attempts: u32,
    pub duration_ms: u64,
    /// Deprecation notices and output-shape mismatches.
    pub warnings: Vec<String>,
}

impl ToolRegistry {
    /// Invoke the highest version of `name` once.
    pub async fn invoke(
        &self,
        name: &str,
        input: Value,
        caller: &CallerContext,
    ) -> Result<Value, ToolError> {
        self.invoke_detailed(name, input, caller)
            .await
            .map(|inv| inv.output)
    }

    pub async fn invoke_detailed(
        &self,
        name: &str,
        input: Value,
        caller: &CallerContext,
    ) -> Result<Invocation, ToolError> {
        self.run_pipeline(name, input, caller, None).await
    }

    /// Invoke through the retry engine.
    ///
    /// Policy precedence: `policy`, then the descriptor's `retry_policy`, then
    /// `default`. Retries only happen when both the policy and the tool's
    /// security declaration are idempotent.
    pub async fn invoke_with_retry(
        &self,
        name: &str,
        input: Value,
        caller: &CallerContext,
        policy: Option<&str>,
    ) -> Result<Value, ToolError> {
        self.invoke_with_retry_detailed(name, input, caller, policy)
            .await
            .map(|inv| inv.output)
    }

    pub async fn invoke_with_retry_detailed(
        &self,
        name: &str,
        input: Value,
        caller: &CallerContext,
        policy: Option<&str>,
    ) -> Result<Invocation, ToolError> {
        self.run_pipeline(name, input, caller, Some(policy)).await
    }

    /// Try each tool in order with the same input; first success wins.
    pub async fn invoke_with_fallback(
        &self,
        candidates: &[&str],
        input: Value,
        caller: &CallerContext,
    ) -> Result<Invocation, FallbackError> {
        with_fallback(
            candidates
                .iter()
                .map(|name| (*name, self.invoke_detailed(name, input.clone(), caller))),
        )
        .await
    }

    async fn run_pipeline(
        &self,
        name: &str,
        input: Value,
        caller: &CallerContext,
        retry: Option<Option<&str>>,
    ) -> Result<Invocation, ToolError> {
        self.run_counted(name, input, caller, retry).await.0
    }

    /// Like the public entry points, but also reports how many times the
    /// handler ran, including on failure (0 when rejected before execution).
    ///
    /// `retry`: `None` for a single attempt, `Some(policy)` to go through
    /// the retry engine.
    pub(crate) async fn run_counted(
        &self,
        name: &str,
        input: Value,
        caller: &CallerContext,
        retry: Option<Option<&str>>,
    ) -> (Result<Invocation, ToolError>, u32) {
        match self.checked_execute(name, input, caller, retry).await {
            Ok(invocation) => {
                let attempts = invocation.attempts;
                (Ok(invocation), attempts)
            }
            Err((err, attempts)) => (Err(err), attempts),
        }
    }

    async fn checked_execute(
        &self,
        name: &str,
        input: Value,
        caller: &CallerContext,
        retry: Option<Option<&str>>,
    ) -> Result<Invocation, (ToolError, u32)> {
        let rejected = |err: ToolError| (err, 0u32);
        let (tool, dependencies) = {
            let catalog = self.catalog.read().await;
            let tool = latest(&catalog, name)
                .ok_or_else(|| rejected(ToolError::NotFound(name.to_string())))?;
            let report = self.dependency_report(&catalog, &tool.descriptor);
            (tool, report)
        };
        let descriptor = &tool.descriptor;
        let flags = self
            .flags(name)
            .unwrap_or_else(|| ToolFlags {
                enabled: descriptor.enabled,
                deprecated: descriptor.deprecated,
                deprecation_message: descriptor.deprecation_message.clone(),
            });

        if !flags.enabled {
            return Err(rejected(ToolError::Disabled(name.to_string())));
        }

        check_permissions(descriptor, caller).map_err(rejected)?;

        validate(&descriptor.input_schema, &input).map_err(|violations| {
            rejected(ToolError::Validation {
                tool: name.to_string(),
                message: describe_violations(&violations),
            })
        })?;

        if !dependencies.satisfied {
            return Err(rejected(ToolError::Dependency(format!(
                "'{name}' has unsatisfied required dependencies: {}",
                dependencies.missing_required.join(", ")
            ))));
        }

        let started = Instant::now();
        let (result, attempts) = match retry {
            None => (tool.handler.execute(input, caller).await, 1),
            Some(requested) => {
                let policy_name = requested
                    .or(descriptor.retry_policy.as_deref())
                    .unwrap_or(DEFAULT_POLICY_NAME);
                let mut policy = self.retry.policy(policy_name).await;
                if policy.idempotent && !descriptor.security.idempotent {
                    tracing::debug!(
                        tool = name,
                        policy = policy_name,
                        "tool is not idempotent, retries disabled"
                    );
                    policy.idempotent = false;
                }
                let outcome = run_with_policy(&policy, name, || {
                    tool.handler.execute(input.clone(), caller)
                })
                .await;
                (outcome.result, outcome.attempts)
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        self.record_invocation(name, result.is_ok(), duration_ms);

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(tool = name, attempts, error = %err, "tool invocation failed");
                return Err((err, attempts));
            }
        };

        let mut warnings = Vec::new();

        if let Err(violations) = validate(&descriptor.output_schema, &output) {
            let detail = describe_violations(&violations);
            tracing::warn!(
                tool = name,
                version = %tool.version,
                violations = detail.as_str(),
                "tool output does not match its declared schema"
            );
            warnings.push(format!("output schema mismatch: {detail}"));
        }

        if flags.deprecated {
            let message = flags
                .deprecation_message
                .unwrap_or_else(|| format!("tool '{name}' is deprecated"));
            tracing::warn!(
                target: "toolweave::deprecation",
                tool = name,
                version = %tool.version,
                message = message.as_str(),
                "deprecated tool invoked"
            );
            warnings.push(message);
        }

        tracing::debug!(tool = name, attempts, duration_ms, "tool invocation succeeded");

        Ok(Invocation {
            tool: name.to_string(),
            version: tool.version.to_string(),
            output,
            attempts,
            duration_ms,
            warnings,
        })
    }
}

/// Caller must hold every declared permission, and approval when required.
pub fn check_permissions(
    descriptor: &ToolDescriptor,
    caller: &CallerContext,
) -> Result<(), ToolError> {
    let missing: Vec<&str> = descriptor
        .security
        .permissions
        .iter()
        .filter(|p| !caller.permissions.contains(*p))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(ToolError::Permission(format!(
            "'{}' requires {}",
            descriptor.name,
            missing.join(", ")
        )));
    }
    if descriptor.security.requires_approval && !caller.approved {
        return Err(ToolError::Permission(format!(
            "'{}' requires explicit approval",
            descriptor.name
        )));
    }
    Ok(())
}
