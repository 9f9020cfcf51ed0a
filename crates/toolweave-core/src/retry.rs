//! Policy-driven retry with exponential backoff, plus ordered fallback.
//!
//! Policies are registered by name on a [`RetryEngine`]. The attempt loop
//! itself is [`run_with_policy`], which the tool registry also calls directly
//! when it needs to tighten a policy for a non-idempotent tool.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;

use toolweave_types::error::ToolError;
use toolweave_types::retry::{DEFAULT_POLICY_NAME, RetryPolicy};

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// An error the retry loop can classify.
///
/// The display text is matched against the policy's retryable signatures.
pub trait RetryableError: fmt::Display {
    /// Whether this error category may ever be retried.
    fn retry_eligible(&self) -> bool {
        true
    }
}

impl RetryableError for ToolError {
    fn retry_eligible(&self) -> bool {
        self.is_retry_eligible()
    }
}

/// Decide whether a failure on `attempt` (1-based) should be re-attempted.
pub fn should_retry<E: RetryableError>(policy: &RetryPolicy, error: &E, attempt: u32) -> bool {
    if !policy.idempotent || attempt >= policy.max_attempts || !error.retry_eligible() {
        return false;
    }
    matches_signature(policy, &error.to_string())
}

/// Case-insensitive substring match. No signatures means any error matches.
pub fn matches_signature(policy: &RetryPolicy, message: &str) -> bool {
    if policy.retryable_signatures.is_empty() {
        return true;
    }
    let message = message.to_lowercase();
    policy
        .retryable_signatures
        .iter()
        .any(|sig| message.contains(&sig.to_lowercase()))
}

/// Delay inserted after a failed `attempt` (1-based):
/// `min(initial * multiplier^(attempt - 1), max)`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let factor = policy.backoff_multiplier.max(1.0).powi(exponent);
    let raw = policy.initial_delay_ms as f64 * factor;
    let capped = if raw.is_finite() {
        raw.min(policy.max_delay_ms as f64)
    } else {
        policy.max_delay_ms as f64
    };
    Duration::from_millis(capped as u64)
}

// ---------------------------------------------------------------------------
// Attempt loop
// ---------------------------------------------------------------------------

/// Result of a retried operation plus what it took to get there.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `operation` under `policy`, re-creating its future for each attempt.
///
/// Attempt 1 runs immediately. A non-idempotent policy never re-attempts.
pub async fn run_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    E: RetryableError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 1;
    let mut total_delay = Duration::ZERO;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = label, attempt, "succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    total_delay,
                };
            }
            Err(err) => {
                if !should_retry(policy, &err, attempt) {
                    if attempt > 1 {
                        tracing::warn!(
                            operation = label,
                            attempts = attempt,
                            error = %err,
                            "retries exhausted"
                        );
                    }
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                        total_delay,
                    };
                }

                let delay = backoff_delay(policy, attempt);
                tracing::debug!(
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                total_delay += delay;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RetryEngine
// ---------------------------------------------------------------------------

/// Registry of named retry policies.
///
/// Always contains a `default` entry. Looking up an unknown name yields the
/// default policy, which is not idempotent and therefore never retries.
#[derive(Debug)]
pub struct RetryEngine {
    policies: RwLock<HashMap<String, RetryPolicy>>,
}

impl RetryEngine {
    pub fn new() -> Self {
        let mut policies = HashMap::new();
        policies.insert(DEFAULT_POLICY_NAME.to_string(), RetryPolicy::default());
        Self {
            policies: RwLock::new(policies),
        }
    }

    /// Build an engine pre-loaded with `policies` (e.g. from config).
    ///
    /// A `default` entry in `policies` replaces the built-in one.
    pub fn with_policies<I>(policies: I) -> Self
    where
        I: IntoIterator<Item = (String, RetryPolicy)>,
    {
        let mut map = HashMap::new();
        map.insert(DEFAULT_POLICY_NAME.to_string(), RetryPolicy::default());
        map.extend(policies);
        Self {
            policies: RwLock::new(map),
        }
    }

    pub async fn register_policy(&self, name: impl Into<String>, policy: RetryPolicy) {
        let name = name.into();
        tracing::debug!(
            policy = name.as_str(),
            max_attempts = policy.max_attempts,
            "registered retry policy"
        );
        self.policies.write().await.insert(name, policy);
    }

    /// Look up a policy by name, falling back to `default`.
    pub async fn policy(&self, name: &str) -> RetryPolicy {
        let policies = self.policies.read().await;
        if let Some(policy) = policies.get(name) {
            return policy.clone();
        }
        tracing::debug!(policy = name, "unknown retry policy, using default");
        policies
            .get(DEFAULT_POLICY_NAME)
            .cloned()
            .unwrap_or_default()
    }

    /// Registered policy names, sorted.
    pub async fn policy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run `operation` under the named policy and return its result.
    pub async fn with_retry<T, E, F, Fut>(&self, policy_name: &str, operation: F) -> Result<T, E>
    where
        E: RetryableError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.with_retry_report(policy_name, operation)
            .await
            .into_result()
    }

    /// Like [`with_retry`](Self::with_retry) but also reports attempts and delay.
    pub async fn with_retry_report<T, E, F, Fut>(
        &self,
        policy_name: &str,
        operation: F,
    ) -> RetryOutcome<T, E>
    where
        E: RetryableError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let policy = self.policy(policy_name).await;
        run_with_policy(&policy, policy_name, operation).await
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Every candidate in a fallback chain failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe_failures(.failures))]
pub struct FallbackError {
    /// `(candidate label, error text)` in the order tried.
    pub failures: Vec<(String, String)>,
}

fn describe_failures(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "no fallback candidates were provided".to_string();
    }
    let parts: Vec<String> = failures
        .iter()
        .map(|(label, err)| format!("{label}: {err}"))
        .collect();
    format!("all {} candidates failed ({})", failures.len(), parts.join("; "))
}

/// Try each candidate in order and return the first success.
///
/// Candidates are lazy futures; later ones are never polled once an earlier
/// one succeeds.
pub async fn with_fallback<T, E, S, Fut, I>(candidates: I) -> Result<T, FallbackError>
where
    E: fmt::Display,
    S: Into<String>,
    Fut: Future<Output = Result<T, E>>,
    I: IntoIterator<Item = (S, Fut)>,
{
    let mut failures = Vec::new();
    for (label, candidate) in candidates {
        let label = label.into();
        match candidate.await {
            Ok(value) => {
                if !failures.is_empty() {
                    tracing::info!(
                        candidate = label.as_str(),
                        skipped = failures.len(),
                        "fallback candidate succeeded"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                tracing::debug!(
                    candidate = label.as_str(),
                    error = %err,
                    "fallback candidate failed"
                );
                failures.push((label, err.to_string()));
            }
        }
    }
    Err(FallbackError { failures })
}
