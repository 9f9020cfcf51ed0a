//! Workflow-level properties: parallel timing, conditional skip, timeout abort.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use toolweave_core::registry::{FnTool, ToolRegistry};
use toolweave_core::workflow::{
    WorkflowDefinition, WorkflowEngine, WorkflowError, WorkflowStep, parse_workflow_yaml,
};
use toolweave_types::error::ToolError;
use toolweave_types::tool::{CallerContext, ToolDescriptor};
use toolweave_types::workflow::{StepStatus, WorkflowRunStatus};

async fn registry_with_sleep() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::default());
    registry
        .try_register(
            ToolDescriptor::new("sleep", "1.0.0"),
            FnTool::new(|input: Value, _caller: CallerContext| async move {
                let ms = input["ms"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, ToolError>(json!({ "slept_ms": ms }))
            }),
        )
        .await
        .unwrap();
    registry
        .try_register(
            ToolDescriptor::new("echo", "1.0.0"),
            FnTool::new(|input: Value, _caller: CallerContext| async move {
                Ok::<_, ToolError>(input)
            }),
        )
        .await
        .unwrap();
    registry
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_steps_overlap() {
    let engine = WorkflowEngine::new(registry_with_sleep().await);
    let def = WorkflowDefinition::new("fan-out")
        .step(WorkflowStep::new("left", "sleep").with_input(json!({"ms": 1000})).parallel())
        .step(WorkflowStep::new("right", "sleep").with_input(json!({"ms": 1000})).parallel());

    let started = Instant::now();
    let outcome = engine
        .execute(&def, CallerContext::default(), json!({}))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(outcome.is_completed());
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(1800), "took {elapsed:?}");
    assert_eq!(outcome.context.results.len(), 2);
}

#[tokio::test]
async fn false_condition_skips_without_invoking() {
    let registry = registry_with_sleep().await;
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    registry
        .try_register(
            ToolDescriptor::new("expensive", "1.0.0"),
            FnTool::new(move |_input: Value, _caller: CallerContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok::<_, ToolError>(json!("ran")))
            }),
        )
        .await
        .unwrap();

    let def = WorkflowDefinition::new("conditional")
        .step(WorkflowStep::new("check", "echo").with_input(json!({"needed": false})))
        .step(
            WorkflowStep::new("gated", "expensive")
                .depends_on(["check"])
                .when_expr("results.check.needed == true"),
        )
        .step(
            WorkflowStep::new("downstream", "echo")
                .depends_on(["check"])
                .with_input_fn(|ctx| json!({ "gated_ran": ctx.result("gated").is_some() })),
        )
        .step(
            WorkflowStep::new("predicate", "expensive")
                .when(|ctx| ctx.variables["force"].as_bool().unwrap_or(false)),
        );

    let outcome = WorkflowEngine::new(registry)
        .execute(&def, CallerContext::default(), json!({"force": false}))
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(outcome.context.result("gated").is_none());
    assert!(outcome.context.result("predicate").is_none());
    assert_eq!(outcome.step("gated").unwrap().status, StepStatus::Skipped);
    assert_eq!(outcome.step("predicate").unwrap().status, StepStatus::Skipped);
    assert_eq!(
        outcome.context.result("downstream"),
        Some(&json!({"gated_ran": false}))
    );
    // Last step was skipped, so there is no final output.
    assert!(outcome.output.is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_step_past_deadline_aborts_with_timeout() {
    let engine = WorkflowEngine::new(registry_with_sleep().await);
    let def = WorkflowDefinition::new("deadline")
        .with_max_duration(Duration::from_millis(500))
        .step(WorkflowStep::new("quick", "echo").with_input(json!(1)))
        .step(
            WorkflowStep::new("slow", "sleep")
                .depends_on(["quick"])
                .with_input(json!({"ms": 60_000})),
        )
        .step(WorkflowStep::new("after", "echo").depends_on(["slow"]));

    let started = tokio::time::Instant::now();
    let outcome = engine
        .execute(&def, CallerContext::default(), json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowRunStatus::Aborted);
    assert!(matches!(outcome.error, Some(WorkflowError::Timeout { limit_ms: 500 })));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome.step("quick").unwrap().status, StepStatus::Completed);
    assert_eq!(outcome.step("after").unwrap().status, StepStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn parallel_wave_past_deadline_aborts_with_timeout() {
    let engine = WorkflowEngine::new(registry_with_sleep().await);
    let def = WorkflowDefinition::new("deadline")
        .with_max_duration(Duration::from_secs(2))
        .step(WorkflowStep::new("a", "sleep").with_input(json!({"ms": 100})).parallel())
        .step(WorkflowStep::new("b", "sleep").with_input(json!({"ms": 30_000})).parallel());

    let err = engine
        .run_workflow(&def, CallerContext::default(), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Timeout { limit_ms: 2000 }));
}

#[tokio::test]
async fn yaml_workflow_runs_with_templates_and_variables() {
    let yaml = r#"
name: greet
steps:
  - id: hello
    tool: echo
    input:
      text: "hello {{ variables.name }}"
  - id: shout
    tool: echo
    depends_on: [hello]
    condition: "variables.loud"
    input:
      text: "{{ results.hello.text }}"
      loud: true
"#;
    let def = parse_workflow_yaml(yaml).unwrap();
    let output = WorkflowEngine::new(registry_with_sleep().await)
        .run_workflow(&def, CallerContext::default(), json!({"name": "ada", "loud": true}))
        .await
        .unwrap();
    assert_eq!(output, json!({"text": "hello ada", "loud": true}));
}
