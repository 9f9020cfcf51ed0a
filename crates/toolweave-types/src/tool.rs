//! Tool catalog domain types.
//!
//! Defines the descriptor a caller supplies when registering a tool, its
//! security policy and dependency declarations, and the reports and
//! statistics the registry hands back.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Security
// ---------------------------------------------------------------------------

/// How much damage a tool can do if misused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Security declaration attached to every descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Safe to re-execute with the same input. Required for automatic retry.
    #[serde(default)]
    pub idempotent: bool,
    /// Caller must present an explicit approval before execution.
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub risk_tier: RiskTier,
    /// Permissions the caller must hold.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// A dependency on another registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDependency {
    pub name: String,
    /// Semver range expression (e.g. `^1.0.0`, `>=1.2, <2`).
    #[serde(default = "default_range")]
    pub version_range: String,
    #[serde(default)]
    pub optional: bool,
}

fn default_range() -> String {
    "*".to_string()
}

impl ToolDependency {
    pub fn required(name: impl Into<String>, version_range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_range: version_range.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, version_range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_range: version_range.into(),
            optional: true,
        }
    }
}

/// Everything the registry needs to know about a capability.
///
/// Immutable after registration, except `enabled` and `deprecated`, which the
/// registry tracks per tool name and may flip at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Catalog key (slug: lowercase letters, digits, `.`, `_`, `-`).
    pub name: String,
    /// Semantic version string.
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    /// Lowest host version this tool runs on (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_host_version: Option<String>,
    /// Highest host version this tool runs on (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_host_version: Option<String>,
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
    #[serde(default = "empty_schema")]
    pub output_schema: Value,
    #[serde(default)]
    pub dependencies: Vec<ToolDependency>,
    #[serde(default)]
    pub security: SecurityPolicy,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Named retry policy used by retried invocations of this tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<String>,
}

fn empty_schema() -> Value {
    Value::Object(Default::default())
}

fn default_true() -> bool {
    true
}

impl ToolDescriptor {
    /// Minimal descriptor: accepts any input, produces any output, no deps.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            category: None,
            tags: Vec::new(),
            deprecated: false,
            deprecation_message: None,
            min_host_version: None,
            max_host_version: None,
            input_schema: empty_schema(),
            output_schema: empty_schema(),
            dependencies: Vec::new(),
            security: SecurityPolicy::default(),
            enabled: true,
            retry_policy: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_dependency(mut self, dependency: ToolDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_security(mut self, security: SecurityPolicy) -> Self {
        self.security = security;
        self
    }

    pub fn with_retry_policy(mut self, policy: impl Into<String>) -> Self {
        self.retry_policy = Some(policy.into());
        self
    }

    pub fn with_host_range(mut self, min: Option<&str>, max: Option<&str>) -> Self {
        self.min_host_version = min.map(str::to_string);
        self.max_host_version = max.map(str::to_string);
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = true;
        self.deprecation_message = Some(message.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Caller identity
// ---------------------------------------------------------------------------

/// Identity of whoever triggered an invocation, passed through to handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Set when a human approved this call (for `requires_approval` tools).
    #[serde(default)]
    pub approved: bool,
}

impl CallerContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn approved(mut self) -> Self {
        self.approved = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of a `register` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReport {
    pub accepted: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Direct (non-transitive) dependency status of one tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub satisfied: bool,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
}

/// Filter for `list_tools`. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub deprecated: Option<bool>,
    pub enabled: Option<bool>,
}

/// Catalog row returned by `list_tools`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub version: String,
    pub description: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub enabled: bool,
    pub deprecated: bool,
    pub risk_tier: RiskTier,
    /// Every registered version, ascending.
    pub versions: Vec<String>,
}

/// Per-tool invocation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStats {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
    pub last_invoked_at: Option<DateTime<Utc>>,
}

/// Snapshot returned by `get_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_tools: usize,
    pub total_versions: usize,
    pub enabled_tools: usize,
    pub deprecated_tools: usize,
    pub per_tool: BTreeMap<String, ToolStats>,
}
