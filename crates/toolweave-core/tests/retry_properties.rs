//! Retry gating and backoff shape.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use toolweave_core::retry::{RetryEngine, backoff_delay};
use toolweave_types::error::ToolError;
use toolweave_types::retry::RetryPolicy;

#[tokio::test(start_paused = true)]
async fn non_idempotent_policy_attempts_exactly_once() {
    let engine = RetryEngine::new();
    let mut policy = RetryPolicy::idempotent(10, 1, 5).with_signatures(["timeout", "reset"]);
    policy.idempotent = false;
    engine.register_policy("careful", policy).await;

    for name in ["careful", "default", "never-registered"] {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), ToolError> = engine
            .with_retry(name, || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ToolError::execution("connection reset, timeout"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "policy {name}");
    }
}

#[tokio::test(start_paused = true)]
async fn idempotent_policy_stops_at_max_attempts() {
    let engine = RetryEngine::new();
    engine
        .register_policy("net", RetryPolicy::idempotent(4, 100, 1_000))
        .await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let report = engine
        .with_retry_report("net", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ToolError::execution("upstream 503"))
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.attempts, 4);
    // 100 + 200 + 400
    assert_eq!(report.total_delay, Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn validation_errors_are_never_retried() {
    let engine = RetryEngine::new();
    engine
        .register_policy("net", RetryPolicy::idempotent(5, 10, 100))
        .await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let _ = engine
        .with_retry("net", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ToolError::Validation {
                    tool: "t".into(),
                    message: "bad input".into(),
                })
            }
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn backoff_is_non_decreasing_and_capped() {
    let policies = [
        RetryPolicy::idempotent(20, 100, 5_000),
        RetryPolicy::idempotent(20, 250, 1_000).with_multiplier(3.0),
        RetryPolicy::idempotent(20, 50, 50).with_multiplier(1.0),
        RetryPolicy::idempotent(20, 10, 10_000).with_multiplier(0.5),
        RetryPolicy::idempotent(64, 1, u64::MAX / 2).with_multiplier(1e9),
    ];
    for policy in policies {
        let cap = Duration::from_millis(policy.max_delay_ms);
        let mut previous = Duration::ZERO;
        for attempt in 1..=policy.max_attempts {
            let delay = backoff_delay(&policy, attempt);
            assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
            assert!(delay <= cap, "attempt {attempt}: {delay:?} > {cap:?}");
            previous = delay;
        }
    }
}
