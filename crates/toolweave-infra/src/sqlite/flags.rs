//! SQLite-backed [`FlagStore`].

use chrono::Utc;
use sqlx::Row;

use toolweave_core::storage::flag_store::FlagStore;
use toolweave_types::error::RepositoryError;

use super::pool::DatabasePool;

pub struct SqliteFlagStore {
    pool: DatabasePool,
}

impl SqliteFlagStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Every stored `(key, value)` pair, ordered by key.
    pub async fn entries(&self) -> Result<Vec<(String, String)>, RepositoryError> {
        let rows = sqlx::query("SELECT key, value FROM tool_flags ORDER BY key")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let key: String = row
                    .try_get("key")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let value: String = row
                    .try_get("value")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok((key, value))
            })
            .collect()
    }
}

impl FlagStore for SqliteFlagStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM tool_flags WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let value: String = row
                    .try_get("value")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO tool_flags (key, value, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE
               SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use toolweave_core::registry::{FnTool, ToolRegistry};
    use toolweave_types::error::ToolError;
    use toolweave_types::tool::{CallerContext, ToolDescriptor};

    use super::*;

    async fn test_store() -> (SqliteFlagStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("flags.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteFlagStore::new(pool), dir)
    }

    #[tokio::test]
    async fn test_set_get_and_overwrite() {
        let (store, _dir) = test_store().await;
        assert_eq!(store.get("tool.echo.enabled").await.unwrap(), None);

        store.set("tool.echo.enabled", "true").await.unwrap();
        store.set("tool.echo.enabled", "false").await.unwrap();
        assert_eq!(store.get("tool.echo.enabled").await.unwrap().as_deref(), Some("false"));
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flags_survive_registry_restart() {
        let (store, _dir) = test_store().await;

        async fn registry() -> ToolRegistry {
            let registry = ToolRegistry::default();
            registry
                .register(
                    ToolDescriptor::new("echo", "1.0.0"),
                    FnTool::new(|input: Value, _c: CallerContext| async move {
                        Ok::<_, ToolError>(input)
                    }),
                )
                .await;
            registry
        }

        let first = registry().await;
        first.set_enabled("echo", false).unwrap();
        first.persist_flags(&store).await.unwrap();

        let second = registry().await;
        assert_eq!(second.restore_flags(&store).await.unwrap(), 1);
        let err = second
            .invoke("echo", json!({}), &CallerContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::Disabled("echo".into()));
    }
}
