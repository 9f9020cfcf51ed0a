//! Retry policy configuration.

use serde::{Deserialize, Serialize};

/// Name under which the conservative fallback policy is registered.
pub const DEFAULT_POLICY_NAME: &str = "default";

/// A named retry policy.
///
/// `idempotent` is a hard gate: when false, the operation is attempted
/// exactly once regardless of `max_attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Case-insensitive substrings marking an error as transient.
    /// Empty means every retry-eligible error qualifies.
    #[serde(default = "default_retryable_signatures")]
    pub retryable_signatures: Vec<String>,
    #[serde(default)]
    pub idempotent: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retryable_signatures() -> Vec<String> {
    [
        "timeout",
        "timed out",
        "connection",
        "rate limit",
        "429",
        "502",
        "503",
        "504",
        "temporarily unavailable",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for RetryPolicy {
    /// Conservative policy: 3 attempts, but not idempotent, so no retry
    /// happens unless a caller explicitly opts in.
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            retryable_signatures: default_retryable_signatures(),
            idempotent: false,
        }
    }
}

impl RetryPolicy {
    /// An idempotent policy with the given attempt budget and delays.
    pub fn idempotent(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            idempotent: true,
            ..Self::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_signatures<I, S>(mut self, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_signatures = signatures.into_iter().map(Into::into).collect();
        self
    }
}
