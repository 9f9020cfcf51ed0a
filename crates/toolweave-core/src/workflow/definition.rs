//! Workflow definitions: runtime form, YAML parsing, and structural validation.
//!
//! `WorkflowDefinition` is what the engine executes. It can be built in code
//! (where step inputs and conditions may be closures over the context) or
//! converted from a serializable `WorkflowManifest` loaded from YAML.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use toolweave_types::error::ToolError;
use toolweave_types::workflow::{OnError, WorkflowManifest};

use super::context::{WorkflowContext, contains_placeholder};
use super::dag::validate_dag;
use super::expression::WorkflowEvaluator;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    #[error("step dependency cycle detected: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    /// Steps still pending with nothing ready to run.
    #[error("unresolvable dependencies for steps: {}", .0.join(", "))]
    UnresolvableDependencies(Vec<String>),

    #[error("workflow exceeded its maximum duration of {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("step '{step_id}' failed: {source}")]
    StepFailed {
        step_id: String,
        #[source]
        source: ToolError,
    },

    #[error("expression error: {0}")]
    Expression(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Step input and condition
// ---------------------------------------------------------------------------

pub type InputFn = Arc<dyn Fn(&WorkflowContext) -> Value + Send + Sync>;
pub type PredicateFn = Arc<dyn Fn(&WorkflowContext) -> bool + Send + Sync>;

/// How a step's input is produced. Evaluated just before the step runs.
#[derive(Clone)]
pub enum StepInput {
    Static(Value),
    /// String leaves with `{{ .. }}` placeholders are substituted from the context.
    Template(Value),
    FromContext(InputFn),
}

impl StepInput {
    pub fn resolve(&self, ctx: &WorkflowContext) -> Value {
        match self {
            StepInput::Static(value) => value.clone(),
            StepInput::Template(template) => ctx.resolve_template(template),
            StepInput::FromContext(f) => f(ctx),
        }
    }
}

impl fmt::Debug for StepInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepInput::Static(v) => f.debug_tuple("Static").field(v).finish(),
            StepInput::Template(v) => f.debug_tuple("Template").field(v).finish(),
            StepInput::FromContext(_) => f.write_str("FromContext(<fn>)"),
        }
    }
}

/// Gate evaluated against the context before a step runs.
#[derive(Clone, Default)]
pub enum StepCondition {
    #[default]
    Always,
    Predicate(PredicateFn),
    /// JEXL expression over `{ results, errors, variables, caller, workflow }`.
    Expression(String),
}

impl StepCondition {
    pub fn evaluate(&self, ctx: &WorkflowContext) -> Result<bool, WorkflowError> {
        match self {
            StepCondition::Always => Ok(true),
            StepCondition::Predicate(f) => Ok(f(ctx)),
            StepCondition::Expression(expr) => WorkflowEvaluator::new()
                .evaluate_in_workflow_context(expr, ctx)
                .map_err(|e| WorkflowError::Expression(format!("'{expr}': {e}"))),
        }
    }
}

impl fmt::Debug for StepCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepCondition::Always => f.write_str("Always"),
            StepCondition::Predicate(_) => f.write_str("Predicate(<fn>)"),
            StepCondition::Expression(e) => f.debug_tuple("Expression").field(e).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub id: String,
    pub tool: String,
    pub input: StepInput,
    pub depends_on: Vec<String>,
    pub condition: StepCondition,
    pub on_error: OnError,
    pub parallel: bool,
    /// Retry policy used when `on_error` is `Retry`.
    pub retry_policy: Option<String>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            input: StepInput::Static(Value::Object(Default::default())),
            depends_on: Vec::new(),
            condition: StepCondition::Always,
            on_error: OnError::Fail,
            parallel: false,
            retry_policy: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = StepInput::Static(input);
        self
    }

    pub fn with_template(mut self, template: Value) -> Self {
        self.input = StepInput::Template(template);
        self
    }

    pub fn with_input_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&WorkflowContext) -> Value + Send + Sync + 'static,
    {
        self.input = StepInput::FromContext(Arc::new(f));
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&WorkflowContext) -> bool + Send + Sync + 'static,
    {
        self.condition = StepCondition::Predicate(Arc::new(predicate));
        self
    }

    pub fn when_expr(mut self, expression: impl Into<String>) -> Self {
        self.condition = StepCondition::Expression(expression.into());
        self
    }

    pub fn on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn with_retry_policy(mut self, policy: impl Into<String>) -> Self {
        self.retry_policy = Some(policy.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    pub max_duration: Option<Duration>,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            max_duration: None,
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Convert a serializable manifest. Inputs containing placeholders become
    /// templates; conditions become JEXL expressions.
    pub fn from_manifest(manifest: WorkflowManifest) -> Self {
        let steps = manifest
            .steps
            .into_iter()
            .map(|s| {
                let input = match s.input {
                    Some(value) if contains_placeholder(&value) => StepInput::Template(value),
                    Some(value) => StepInput::Static(value),
                    None => StepInput::Static(Value::Object(Default::default())),
                };
                WorkflowStep {
                    id: s.id,
                    tool: s.tool,
                    input,
                    depends_on: s.depends_on,
                    condition: s
                        .condition
                        .map(StepCondition::Expression)
                        .unwrap_or_default(),
                    on_error: s.on_error,
                    parallel: s.parallel,
                    retry_policy: s.retry_policy,
                }
            })
            .collect();

        Self {
            name: manifest.name,
            description: manifest.description,
            max_duration: manifest.max_duration_secs.map(Duration::from_secs),
            steps,
        }
    }

    pub fn step_by_id(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML manifest into a validated `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let manifest: WorkflowManifest =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::Parse(e.to_string()))?;
    let def = WorkflowDefinition::from_manifest(manifest);
    validate_definition(&def)?;
    Ok(def)
}

/// Load and validate a workflow YAML file.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow_yaml(&content)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Structural checks run before any step executes:
/// non-empty name and steps, unique non-empty ids, tool names present,
/// known `depends_on` targets, and an acyclic step graph.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.name.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "workflow name must not be empty".to_string(),
        ));
    }
    if def.steps.is_empty() {
        return Err(WorkflowError::Validation(
            "workflow must have at least one step".to_string(),
        ));
    }
    if def.max_duration.is_some_and(|d| d.is_zero()) {
        return Err(WorkflowError::Validation(
            "max duration must be greater than zero".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for step in &def.steps {
        if step.id.trim().is_empty() {
            return Err(WorkflowError::Validation("step id must not be empty".to_string()));
        }
        if step.tool.trim().is_empty() {
            return Err(WorkflowError::Validation(format!(
                "step '{}' does not name a tool",
                step.id
            )));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(WorkflowError::Validation(format!(
                "duplicate step id: '{}'",
                step.id
            )));
        }
    }

    validate_dag(&def.steps)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
