//! Workflow engine: definitions, step DAG, context, conditions, and execution.
//!
//! - `definition` -- runtime definition types, YAML parsing, structural validation
//! - `dag` -- petgraph step graph and wave grouping
//! - `context` -- per-run results/errors and template resolution
//! - `expression` -- JEXL evaluator for step conditions
//! - `step_runner` -- invokes one step's tool through the registry
//! - `executor` -- dependency-ordered execution with parallel fan-out and a deadline

pub mod context;
pub mod dag;
pub mod definition;
pub mod executor;
pub mod expression;
pub mod step_runner;

pub use context::WorkflowContext;
pub use definition::{
    StepCondition, StepInput, WorkflowDefinition, WorkflowError, WorkflowStep, load_workflow_file,
    parse_workflow_yaml, validate_definition,
};
pub use executor::{OutcomeReport, WorkflowEngine, WorkflowOutcome};
