use thiserror::Error;

/// Errors raised by tool registration and invocation.
///
/// Propagation policy: `Validation`, `Cycle`, `Permission`, and `NotFound`
/// always surface immediately. `Execution` and `Timeout` are the only
/// variants a retry policy may re-attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("validation failed for '{tool}': {message}")]
    Validation { tool: String, message: String },

    #[error("tool not found: '{0}'")]
    NotFound(String),

    #[error("tool '{0}' is disabled")]
    Disabled(String),

    #[error("dependency error: {0}")]
    Dependency(String),

    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("tool '{tool}' timed out after {elapsed_ms}ms")]
    Timeout { tool: String, elapsed_ms: u64 },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("tool '{name}' version {version} is already registered")]
    AlreadyRegistered { name: String, version: String },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

impl ToolError {
    /// Whether a retry policy is allowed to consider this error at all.
    ///
    /// Signature matching happens afterwards; this only excludes the
    /// categories that must never be re-attempted.
    pub fn is_retry_eligible(&self) -> bool {
        matches!(self, ToolError::Execution(_) | ToolError::Timeout { .. })
    }

    /// Convenience constructor for handler failures.
    pub fn execution(message: impl Into<String>) -> Self {
        ToolError::Execution(message.into())
    }
}

/// Errors from flag-store operations (used by trait definitions in toolweave-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}
