//! Workflow executor: dependency-ordered step execution with a run deadline.
//!
//! # Execution flow
//!
//! 1. Validate the definition (unique ids, known references, acyclic).
//! 2. Loop while steps are pending: enforce the deadline, pick the steps whose
//!    dependencies have all reached a terminal state, and split them into
//!    parallel and sequential groups.
//! 3. Parallel steps are evaluated against the current context, then fanned
//!    out on a `JoinSet` with a shared snapshot of it. Results are written
//!    back one at a time as tasks finish.
//! 4. Sequential steps run one after another in definition order, each seeing
//!    everything recorded before it.
//! 5. A failure is handled per `on_error`; a deadline expiry detaches any
//!    in-flight tasks and aborts the run.
//!
//! The final output is the result of the last step in the definition, or
//! `null` if that step was skipped or failed under `continue`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::{Id, JoinSet};
use tokio::time::{Instant, timeout_at};
use uuid::Uuid;

use toolweave_types::config::EngineConfig;
use toolweave_types::error::ToolError;
use toolweave_types::tool::CallerContext;
use toolweave_types::workflow::{OnError, StepRecord, StepStatus, WorkflowRunStatus};

use super::context::WorkflowContext;
use super::definition::{WorkflowDefinition, WorkflowError, WorkflowStep, validate_definition};
use super::step_runner::{StepRun, StepRunner};
use crate::registry::ToolRegistry;

/// Everything a finished (or aborted) run produced.
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub run_id: Uuid,
    pub status: WorkflowRunStatus,
    /// Result of the last step in the definition, if it produced one.
    pub output: Option<Value>,
    pub context: WorkflowContext,
    /// One record per step, in definition order.
    pub steps: Vec<StepRecord>,
    /// Why the run aborted.
    pub error: Option<WorkflowError>,
    pub duration_ms: u64,
}

impl WorkflowOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == WorkflowRunStatus::Completed
    }

    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Serializable summary for reporting.
    pub fn report(&self) -> OutcomeReport {
        OutcomeReport {
            run_id: self.run_id.to_string(),
            workflow: self.context.workflow_name.clone(),
            status: self.status,
            output: self.output.clone(),
            steps: self.steps.clone(),
            error: self.error.as_ref().map(ToString::to_string),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub run_id: String,
    pub workflow: String,
    pub status: WorkflowRunStatus,
    pub output: Option<Value>,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

pub struct WorkflowEngine {
    runner: StepRunner,
    /// Applied when a definition sets no `max_duration`.
    default_max_duration: Option<Duration>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            runner: StepRunner::new(registry),
            default_max_duration: None,
        }
    }

    pub fn from_config(registry: Arc<ToolRegistry>, config: &EngineConfig) -> Self {
        let engine = Self::new(registry);
        match config.default_max_duration_secs {
            Some(secs) => engine.with_default_max_duration(Duration::from_secs(secs)),
            None => engine,
        }
    }

    pub fn with_default_max_duration(mut self, max_duration: Duration) -> Self {
        self.default_max_duration = Some(max_duration);
        self
    }

    /// Run a workflow and return its final output, or the error that aborted it.
    pub async fn run_workflow(
        &self,
        definition: &WorkflowDefinition,
        caller: CallerContext,
        variables: Value,
    ) -> Result<Value, WorkflowError> {
        let outcome = self.execute(definition, caller, variables).await?;
        match outcome.error {
            Some(err) => Err(err),
            None => Ok(outcome.output.unwrap_or(Value::Null)),
        }
    }

    /// Run a workflow and report everything that happened.
    ///
    /// Structural problems (cycles, unknown references) are returned as `Err`
    /// before anything runs. Failures during the run produce an `Ok` outcome
    /// with status `Aborted` and the cause in `error`.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        caller: CallerContext,
        variables: Value,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        validate_definition(definition)?;

        let run_id = Uuid::now_v7();
        let started = Instant::now();
        let limit = definition.max_duration.or(self.default_max_duration);
        let mut run = Run {
            ctx: WorkflowContext::new(definition.name.clone(), run_id, caller, variables),
            records: definition
                .steps
                .iter()
                .map(|s| StepRecord {
                    step_id: s.id.clone(),
                    tool: s.tool.clone(),
                    status: StepStatus::Pending,
                    attempts: 0,
                    duration_ms: 0,
                    error: None,
                })
                .collect(),
            index: definition
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| (s.id.clone(), i))
                .collect(),
            // A limit too large to represent as an instant means no deadline.
            deadline: limit.and_then(|d| {
                started.checked_add(d).map(|at| Deadline {
                    at,
                    limit_ms: u64::try_from(d.as_millis()).unwrap_or(u64::MAX),
                })
            }),
        };

        tracing::info!(
            run_id = %run_id,
            workflow = definition.name.as_str(),
            steps = definition.steps.len(),
            max_duration_ms = run.deadline.map(|d| d.limit_ms),
            "starting workflow"
        );

        let result = self.drive(definition, &mut run).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, error, output) = match result {
            Ok(()) => {
                let output = definition
                    .steps
                    .last()
                    .and_then(|s| run.ctx.result(&s.id).cloned());
                tracing::info!(run_id = %run_id, duration_ms, "workflow completed");
                (WorkflowRunStatus::Completed, None, output)
            }
            Err(err) => {
                tracing::warn!(run_id = %run_id, duration_ms, error = %err, "workflow aborted");
                (WorkflowRunStatus::Aborted, Some(err), None)
            }
        };

        Ok(WorkflowOutcome {
            run_id,
            status,
            output,
            context: run.ctx,
            steps: run.records,
            error,
            duration_ms,
        })
    }

    async fn drive(
        &self,
        definition: &WorkflowDefinition,
        run: &mut Run,
    ) -> Result<(), WorkflowError> {
        let mut pending: Vec<&WorkflowStep> = definition.steps.iter().collect();
        let mut executed: HashSet<String> = HashSet::new();

        while !pending.is_empty() {
            run.check_deadline()?;

            let (ready, waiting): (Vec<&WorkflowStep>, Vec<&WorkflowStep>) = pending
                .into_iter()
                .partition(|s| s.depends_on.iter().all(|d| executed.contains(d)));
            pending = waiting;

            if ready.is_empty() {
                return Err(WorkflowError::UnresolvableDependencies(
                    pending.iter().map(|s| s.id.clone()).collect(),
                ));
            }

            let (parallel, sequential): (Vec<&WorkflowStep>, Vec<&WorkflowStep>) =
                ready.into_iter().partition(|s| s.parallel);

            tracing::debug!(
                run_id = %run.ctx.run_id,
                parallel = parallel.len(),
                sequential = sequential.len(),
                "processing wave"
            );

            if !parallel.is_empty() {
                self.run_parallel(&parallel, run).await?;
                executed.extend(parallel.iter().map(|s| s.id.clone()));
            }

            for step in sequential {
                run.check_deadline()?;
                self.run_sequential(step, run).await?;
                executed.insert(step.id.clone());
            }
        }

        Ok(())
    }

    async fn run_parallel(
        &self,
        steps: &[&WorkflowStep],
        run: &mut Run,
    ) -> Result<(), WorkflowError> {
        let mut to_run = Vec::with_capacity(steps.len());
        for step in steps {
            if run.should_run(step)? {
                to_run.push(*step);
            }
        }
        if to_run.is_empty() {
            return Ok(());
        }

        let snapshot = Arc::new(run.ctx.clone());
        let mut join_set = JoinSet::new();
        let mut task_steps: HashMap<Id, String> = HashMap::new();

        for step in &to_run {
            run.mark_running(&step.id);
            let runner = self.runner.clone();
            let owned = (*step).clone();
            let ctx = Arc::clone(&snapshot);
            let handle = join_set.spawn(async move { runner.run(&owned, &ctx).await });
            task_steps.insert(handle.id(), step.id.clone());
        }

        loop {
            let joined = match run.deadline {
                Some(deadline) => match timeout_at(deadline.at, join_set.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        join_set.detach_all();
                        return Err(deadline.exceeded());
                    }
                },
                None => join_set.join_next().await,
            };
            let Some(joined) = joined else { break };

            let step_run = match joined {
                Ok(step_run) => step_run,
                Err(join_err) => {
                    let step_id = task_steps.get(&join_err.id()).cloned().unwrap_or_default();
                    panicked(step_id, &join_err)
                }
            };

            let step = to_run
                .iter()
                .find(|s| s.id == step_run.step_id)
                .copied()
                .ok_or_else(|| {
                    WorkflowError::Validation(format!("unknown step '{}'", step_run.step_id))
                })?;

            if let Err(err) = run.apply(step, step_run) {
                join_set.detach_all();
                return Err(err);
            }
        }

        Ok(())
    }

    async fn run_sequential(
        &self,
        step: &WorkflowStep,
        run: &mut Run,
    ) -> Result<(), WorkflowError> {
        if !run.should_run(step)? {
            return Ok(());
        }

        run.mark_running(&step.id);
        let runner = self.runner.clone();
        let owned = step.clone();
        let ctx = run.ctx.clone();
        let handle = tokio::spawn(async move { runner.run(&owned, &ctx).await });

        // Dropping the handle on expiry detaches the task.
        let joined = match run.deadline {
            Some(deadline) => timeout_at(deadline.at, handle)
                .await
                .map_err(|_| deadline.exceeded())?,
            None => handle.await,
        };

        let step_run = joined.unwrap_or_else(|join_err| panicked(step.id.clone(), &join_err));
        run.apply(step, step_run)
    }
}

fn panicked(step_id: String, join_err: &tokio::task::JoinError) -> StepRun {
    StepRun {
        step_id,
        result: Err(ToolError::execution(format!("step task failed: {join_err}"))),
        attempts: 1,
        duration_ms: 0,
        warnings: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit_ms: u64,
}

impl Deadline {
    fn exceeded(self) -> WorkflowError {
        WorkflowError::Timeout {
            limit_ms: self.limit_ms,
        }
    }
}

struct Run {
    ctx: WorkflowContext,
    records: Vec<StepRecord>,
    index: HashMap<String, usize>,
    deadline: Option<Deadline>,
}

impl Run {
    fn check_deadline(&self) -> Result<(), WorkflowError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline.at => Err(deadline.exceeded()),
            _ => Ok(()),
        }
    }

    fn record_mut(&mut self, step_id: &str) -> Option<&mut StepRecord> {
        let idx = *self.index.get(step_id)?;
        self.records.get_mut(idx)
    }

    fn mark_running(&mut self, step_id: &str) {
        if let Some(record) = self.record_mut(step_id) {
            record.status = StepStatus::Running;
        }
    }

    /// Evaluate the step's condition against the current context. A false
    /// condition marks the step skipped; it leaves nothing in `results`.
    fn should_run(&mut self, step: &WorkflowStep) -> Result<bool, WorkflowError> {
        if step.condition.evaluate(&self.ctx)? {
            return Ok(true);
        }
        tracing::debug!(
            run_id = %self.ctx.run_id,
            step_id = step.id.as_str(),
            "condition false, skipping step"
        );
        if let Some(record) = self.record_mut(&step.id) {
            record.status = StepStatus::Skipped;
        }
        Ok(false)
    }

    /// Record a step's result and apply its `on_error` policy.
    fn apply(&mut self, step: &WorkflowStep, step_run: StepRun) -> Result<(), WorkflowError> {
        let run_id = self.ctx.run_id;
        let StepRun {
            result,
            attempts,
            duration_ms,
            ..
        } = step_run;

        if let Some(record) = self.record_mut(&step.id) {
            record.attempts = attempts;
            record.duration_ms = duration_ms;
        }

        let err = match result {
            Ok(output) => {
                tracing::debug!(
                    run_id = %run_id,
                    step_id = step.id.as_str(),
                    attempts,
                    duration_ms,
                    "step completed"
                );
                if let Some(record) = self.record_mut(&step.id) {
                    record.status = StepStatus::Completed;
                }
                self.ctx.record_result(&step.id, output);
                return Ok(());
            }
            Err(err) => err,
        };

        if let Some(record) = self.record_mut(&step.id) {
            record.status = StepStatus::Failed;
            record.error = Some(err.to_string());
        }
        self.ctx.record_error(&step.id, err.clone());

        let step_failed = |source: ToolError| WorkflowError::StepFailed {
            step_id: step.id.clone(),
            source,
        };

        if surfaces_immediately(&err) {
            tracing::warn!(
                run_id = %run_id,
                step_id = step.id.as_str(),
                error = %err,
                "step rejected by registry"
            );
            return Err(step_failed(err));
        }

        match step.on_error {
            OnError::Continue => {
                tracing::warn!(
                    run_id = %run_id,
                    step_id = step.id.as_str(),
                    error = %err,
                    "step failed, continuing"
                );
                Ok(())
            }
            OnError::Fail => {
                tracing::warn!(
                    run_id = %run_id,
                    step_id = step.id.as_str(),
                    error = %err,
                    "step failed"
                );
                Err(step_failed(err))
            }
            OnError::Retry => {
                tracing::warn!(
                    run_id = %run_id,
                    step_id = step.id.as_str(),
                    attempts,
                    error = %err,
                    "retries exhausted, aborting as on_error: fail"
                );
                Err(step_failed(err))
            }
        }
    }
}

/// Caller and catalog mistakes abort the run regardless of `on_error`.
fn surfaces_immediately(err: &ToolError) -> bool {
    matches!(
        err,
        ToolError::Validation { .. }
            | ToolError::NotFound(_)
            | ToolError::Permission(_)
            | ToolError::Cycle(_)
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use toolweave_types::retry::RetryPolicy;
    use toolweave_types::tool::{SecurityPolicy, ToolDescriptor};

    use super::*;
    use crate::registry::FnTool;
    use crate::retry::RetryEngine;

    async fn registry() -> Arc<ToolRegistry> {
        let registry = Arc::new(ToolRegistry::default());
        registry
            .register(
                ToolDescriptor::new("echo", "1.0.0"),
                FnTool::new(|input: Value, _c: CallerContext| async move {
                    Ok::<_, ToolError>(input)
                }),
            )
            .await;
        registry
            .register(
                ToolDescriptor::new("boom", "1.0.0"),
                FnTool::new(|_input: Value, _c: CallerContext| async move {
                    Err::<Value, _>(ToolError::execution("boom"))
                }),
            )
            .await;
        registry
            .register(
                ToolDescriptor::new("nap", "1.0.0"),
                FnTool::new(|input: Value, _c: CallerContext| async move {
                    let ms = input["ms"].as_u64().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok::<_, ToolError>(json!({"slept_ms": ms}))
                }),
            )
            .await;
        registry
    }

    #[tokio::test]
    async fn test_linear_run_passes_results_forward() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("chain")
            .step(WorkflowStep::new("a", "echo").with_input(json!({"n": 1})))
            .step(
                WorkflowStep::new("b", "echo")
                    .depends_on(["a"])
                    .with_template(json!({"from_a": "{{ results.a.n }}"})),
            );

        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.output, Some(json!({"from_a": 1})));
        assert_eq!(outcome.step("a").unwrap().status, StepStatus::Completed);
        assert_eq!(outcome.step("b").unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_max_duration_runs_without_deadline() {
        let def = crate::workflow::parse_workflow_yaml(
            r#"
name: forever
max_duration_secs: 18446744073709551615
steps:
  - id: a
    tool: echo
    input: {n: 1}
"#,
        )
        .unwrap();
        assert_eq!(def.max_duration, Some(Duration::from_secs(u64::MAX)));

        let engine = WorkflowEngine::new(registry().await);
        let output = engine
            .run_workflow(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert_eq!(output, json!({"n": 1}));

        let engine = WorkflowEngine::new(registry().await)
            .with_default_max_duration(Duration::from_secs(u64::MAX));
        let def = WorkflowDefinition::new("w").step(WorkflowStep::new("a", "echo"));
        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert!(outcome.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_aborts_like_fail() {
        let retry = Arc::new(RetryEngine::new());
        retry
            .register_policy("thrice", RetryPolicy::idempotent(3, 10, 100))
            .await;
        let registry = Arc::new(ToolRegistry::new(retry));
        registry
            .register(
                ToolDescriptor::new("flaky", "1.0.0").with_security(SecurityPolicy {
                    idempotent: true,
                    ..SecurityPolicy::default()
                }),
                FnTool::new(|_input: Value, _c: CallerContext| async move {
                    Err::<Value, _>(ToolError::execution("connection reset"))
                }),
            )
            .await;
        registry
            .register(
                ToolDescriptor::new("echo", "1.0.0"),
                FnTool::new(|input: Value, _c: CallerContext| async move {
                    Ok::<_, ToolError>(input)
                }),
            )
            .await;

        let engine = WorkflowEngine::new(registry);
        let def = WorkflowDefinition::new("w")
            .step(
                WorkflowStep::new("pull", "flaky")
                    .on_error(OnError::Retry)
                    .with_retry_policy("thrice"),
            )
            .step(WorkflowStep::new("after", "echo").depends_on(["pull"]));

        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.status, WorkflowRunStatus::Aborted);
        match &outcome.error {
            Some(WorkflowError::StepFailed { step_id, source }) => {
                assert_eq!(step_id, "pull");
                assert_eq!(*source, ToolError::execution("connection reset"));
            }
            other => panic!("expected step failure, got {other:?}"),
        }
        let pull = outcome.step("pull").unwrap();
        assert_eq!(pull.status, StepStatus::Failed);
        assert_eq!(pull.attempts, 3);
        assert_eq!(outcome.step("after").unwrap().status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn test_fail_aborts_with_step_id() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("a", "boom"))
            .step(WorkflowStep::new("b", "echo").depends_on(["a"]));

        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.status, WorkflowRunStatus::Aborted);
        match &outcome.error {
            Some(WorkflowError::StepFailed { step_id, source }) => {
                assert_eq!(step_id, "a");
                assert_eq!(*source, ToolError::execution("boom"));
            }
            other => panic!("expected step failure, got {other:?}"),
        }
        assert_eq!(outcome.step("a").unwrap().status, StepStatus::Failed);
        assert_eq!(outcome.step("b").unwrap().status, StepStatus::Pending);
        assert!(outcome.output.is_none());
    }

    #[tokio::test]
    async fn test_continue_records_error_and_proceeds() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("a", "boom").on_error(OnError::Continue))
            .step(
                WorkflowStep::new("b", "echo")
                    .depends_on(["a"])
                    .with_input_fn(|ctx| json!({"a_failed": ctx.error("a").is_some()})),
            );

        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.output, Some(json!({"a_failed": true})));
        assert!(outcome.context.result("a").is_none());
        assert!(outcome.step("a").unwrap().error.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts_even_under_continue() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("a", "ghost").on_error(OnError::Continue))
            .step(WorkflowStep::new("b", "echo"));

        let err = engine
            .run_workflow(&def, CallerContext::default(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::StepFailed { source: ToolError::NotFound(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_sequential_steps_run_in_definition_order() {
        let registry = registry().await;
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        registry
            .register(
                ToolDescriptor::new("note", "1.0.0"),
                FnTool::new(move |input: Value, _c: CallerContext| {
                    let seen = Arc::clone(&seen);
                    async move {
                        if let Ok(mut order) = seen.lock() {
                            order.push(input["id"].as_str().unwrap_or_default().to_string());
                        }
                        Ok::<_, ToolError>(input)
                    }
                }),
            )
            .await;

        let mut def = WorkflowDefinition::new("w");
        for id in ["s1", "s2", "s3", "s4"] {
            def = def.step(WorkflowStep::new(id, "note").with_input(json!({ "id": id })));
        }
        WorkflowEngine::new(registry)
            .run_workflow(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["s1", "s2", "s3", "s4"]);
    }

    #[tokio::test]
    async fn test_sequential_condition_sees_earlier_sibling() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("a", "echo").with_input(json!({"go": false})))
            .step(WorkflowStep::new("b", "echo").when_expr("results.a.go"));

        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.step("b").unwrap().status, StepStatus::Skipped);
        assert!(outcome.output.is_none());
    }

    #[tokio::test]
    async fn test_bad_condition_aborts() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("a", "echo").when_expr("results.("));
        let err = engine
            .run_workflow(&def, CallerContext::default(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Expression(_)));
    }

    #[tokio::test]
    async fn test_structural_errors_reject_before_running() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("a", "echo").depends_on(["b"]))
            .step(WorkflowStep::new("b", "echo").depends_on(["a"]));
        assert!(matches!(
            engine.execute(&def, CallerContext::default(), json!({})).await,
            Err(WorkflowError::CycleDetected(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_deadline_applies() {
        let engine =
            WorkflowEngine::new(registry().await)
                .with_default_max_duration(Duration::from_millis(50));
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("slow", "nap").with_input(json!({"ms": 1000})));
        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        assert!(matches!(outcome.error, Some(WorkflowError::Timeout { limit_ms: 50 })));
        assert_eq!(outcome.step("slow").unwrap().status, StepStatus::Running);
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let engine = WorkflowEngine::new(registry().await);
        let def = WorkflowDefinition::new("w")
            .step(WorkflowStep::new("a", "echo").with_input(json!("hi")));
        let outcome = engine
            .execute(&def, CallerContext::default(), json!({}))
            .await
            .unwrap();
        let report = serde_json::to_value(outcome.report()).unwrap();
        assert_eq!(report["status"], json!("completed"));
        assert_eq!(report["output"], json!("hi"));
        assert_eq!(report["steps"][0]["status"], json!("completed"));
        assert!(report.get("error").is_none());
    }
}
