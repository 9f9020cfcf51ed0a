//! Engine configuration types for toolweave.
//!
//! `EngineConfig` represents the top-level `config.toml` that sets the host
//! version, default workflow deadline, and named retry policies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Top-level configuration for the registry and workflow engine.
///
/// Loaded from `~/.toolweave/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version of the host system, checked against descriptor host bounds.
    #[serde(default = "default_host_version")]
    pub host_version: String,

    /// Deadline applied to workflows that do not declare their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_duration_secs: Option<u64>,

    /// Named retry policies registered at startup.
    #[serde(default)]
    pub retry_policies: BTreeMap<String, RetryPolicy>,

    /// SQLite URL for persisted tool flags. Defaults to `{data_dir}/toolweave.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_host_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host_version: default_host_version(),
            default_max_duration_secs: None,
            retry_policies: BTreeMap::new(),
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.host_version, env!("CARGO_PKG_VERSION"));
        assert!(config.retry_policies.is_empty());
        assert!(config.default_max_duration_secs.is_none());
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.host_version, env!("CARGO_PKG_VERSION"));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
host_version = "2.3.0"
default_max_duration_secs = 120

[retry_policies.network]
max_attempts = 5
initial_delay_ms = 200
max_delay_ms = 5000
idempotent = true
retryable_signatures = ["timeout", "503"]

[retry_policies.strict]
max_attempts = 1
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host_version, "2.3.0");
        assert_eq!(config.default_max_duration_secs, Some(120));
        assert_eq!(config.retry_policies.len(), 2);
        let network = &config.retry_policies["network"];
        assert!(network.idempotent);
        assert_eq!(network.max_attempts, 5);
        assert_eq!(network.retryable_signatures, vec!["timeout", "503"]);
        assert!(!config.retry_policies["strict"].idempotent);
    }
}
