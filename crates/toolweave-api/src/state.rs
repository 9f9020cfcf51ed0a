//! Application state wiring the registry, workflow engine, and flag store.

use std::sync::Arc;

use anyhow::Context;

use toolweave_core::registry::ToolRegistry;
use toolweave_core::workflow::WorkflowEngine;
use toolweave_infra::builtin::register_builtins;
use toolweave_infra::config::{load_engine_config, resolve_data_dir, resolve_database_url};
use toolweave_infra::sqlite::flags::SqliteFlagStore;
use toolweave_infra::sqlite::pool::DatabasePool;

/// Shared state for CLI commands.
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub engine: WorkflowEngine,
    pub flag_store: SqliteFlagStore,
}

impl AppState {
    /// Load config, open the database, register built-in tools, and apply
    /// persisted flags.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_engine_config(&data_dir).await;
        let registry = Arc::new(
            ToolRegistry::from_config(&config).context("invalid host_version in config.toml")?,
        );

        for (name, report) in register_builtins(&registry).await {
            if !report.accepted {
                tracing::warn!(
                    tool = name.as_str(),
                    errors = ?report.errors,
                    "built-in tool rejected"
                );
            }
        }

        let db_url = resolve_database_url(&config, &data_dir);
        let pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database at {db_url}"))?;
        let flag_store = SqliteFlagStore::new(pool);
        registry
            .restore_flags(&flag_store)
            .await
            .context("failed to restore tool flags")?;

        let engine = WorkflowEngine::from_config(Arc::clone(&registry), &config);
        tracing::debug!(
            data_dir = %data_dir.display(),
            database = db_url.as_str(),
            "state initialized"
        );

        Ok(Self {
            registry,
            engine,
            flag_store,
        })
    }
}
