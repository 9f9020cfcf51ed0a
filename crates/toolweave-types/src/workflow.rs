//! Workflow domain types for toolweave.
//!
//! `WorkflowManifest` is the serializable (YAML/JSON) form of a workflow.
//! The engine converts it into a runtime definition that may also hold
//! closures; manifests can only express static inputs, templates, and JEXL
//! conditions. This module also contains the run/step status types reported
//! back to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Manifest (serializable definition)
// ---------------------------------------------------------------------------

/// A workflow as written in a YAML or JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Deadline for the whole run, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_secs: Option<u64>,
    pub steps: Vec<StepManifest>,
}

/// A single step in a workflow manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepManifest {
    /// Unique within the workflow.
    pub id: String,
    pub tool: String,
    /// Static input. String leaves like `{{ results.fetch.body }}` are
    /// substituted from the context just before the step runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// JEXL expression; the step is skipped when it evaluates falsy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default)]
    pub parallel: bool,
    /// Named retry policy used when `on_error` is `retry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<String>,
}

/// What happens after a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Abort the run and surface the error.
    #[default]
    Fail,
    /// Record the error and keep going.
    Continue,
    /// Attempt through the retry engine; exhaustion aborts like `Fail`.
    Retry,
}

// ---------------------------------------------------------------------------
// Execution status
// ---------------------------------------------------------------------------

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    Running,
    Completed,
    Aborted,
}

/// Status of an individual step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// What happened to one step during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub tool: String,
    pub status: StepStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_from_yaml_with_defaults() {
        let yaml = r#"
name: digest
max_duration_secs: 30
steps:
  - id: a
    tool: fetch
  - id: b
    tool: transform
    depends_on: [a]
    input:
      value: "{{ results.a }}"
    on_error: retry
    retry_policy: network
    parallel: true
"#;
        let manifest: WorkflowManifest = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(manifest.steps.len(), 2);
        assert_eq!(manifest.steps[0].on_error, OnError::Fail);
        assert!(!manifest.steps[0].parallel);
        assert_eq!(manifest.steps[1].on_error, OnError::Retry);
        assert_eq!(manifest.steps[1].retry_policy.as_deref(), Some("network"));
        assert_eq!(manifest.max_duration_secs, Some(30));
    }

    #[test]
    fn test_step_status_terminal() {
        assert!(StepStatus::Skipped.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
    }

    #[test]
    fn test_on_error_serde_names() {
        let v: OnError = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(v, OnError::Continue);
        assert_eq!(serde_json::to_string(&OnError::Retry).unwrap(), "\"retry\"");
    }
}
