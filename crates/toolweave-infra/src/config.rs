//! Engine configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.toolweave/` by default)
//! and deserializes it into [`EngineConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use toolweave_types::config::EngineConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TOOLWEAVE_DATA_DIR";

/// `TOOLWEAVE_DATA_DIR` if set, otherwise `~/.toolweave`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolweave")
}

/// Load engine configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => {
            tracing::debug!(
                path = %config_path.display(),
                retry_policies = config.retry_policies.len(),
                "loaded engine config"
            );
            config
        }
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            EngineConfig::default()
        }
    }
}

/// `database_url` from the config, or `sqlite://{data_dir}/toolweave.db`.
pub fn resolve_database_url(config: &EngineConfig, data_dir: &Path) -> String {
    config
        .database_url
        .clone()
        .unwrap_or_else(|| format!("sqlite://{}?mode=rwc", data_dir.join("toolweave.db").display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
host_version = "2.3.0"
default_max_duration_secs = 90

[retry_policies.network]
max_attempts = 5
initial_delay_ms = 200
idempotent = true
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.host_version, "2.3.0");
        assert_eq!(config.default_max_duration_secs, Some(90));
        let network = &config.retry_policies["network"];
        assert_eq!(network.max_attempts, 5);
        assert!(network.idempotent);
        assert_eq!(network.max_delay_ms, 30_000);
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();
        assert_eq!(load_engine_config(tmp.path()).await, EngineConfig::default());
    }

    #[test]
    fn database_url_prefers_config() {
        let dir = Path::new("/data");
        let mut config = EngineConfig::default();
        assert_eq!(resolve_database_url(&config, dir), "sqlite:///data/toolweave.db?mode=rwc");
        config.database_url = Some("sqlite::memory:".into());
        assert_eq!(resolve_database_url(&config, dir), "sqlite::memory:");
    }
}
