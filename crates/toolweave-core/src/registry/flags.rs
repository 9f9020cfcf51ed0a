//! Persisting enabled/deprecated flags through a [`FlagStore`].
//!
//! Keys: `tool.<name>.enabled` and `tool.<name>.deprecated` with values
//! `true` / `false`, plus `tool.<name>.deprecation_message` (empty for none).

use toolweave_types::error::RepositoryError;

use super::catalog::ToolRegistry;
use crate::storage::flag_store::FlagStore;

pub fn enabled_key(name: &str) -> String {
    format!("tool.{name}.enabled")
}

pub fn deprecated_key(name: &str) -> String {
    format!("tool.{name}.deprecated")
}

pub fn deprecation_message_key(name: &str) -> String {
    format!("tool.{name}.deprecation_message")
}

impl ToolRegistry {
    /// Write the flags of one tool. No-op for unknown names.
    pub async fn persist_tool_flags<S: FlagStore>(
        &self,
        name: &str,
        store: &S,
    ) -> Result<(), RepositoryError> {
        let Some(flags) = self.flags(name) else {
            return Ok(());
        };
        store.set(&enabled_key(name), bool_str(flags.enabled)).await?;
        store.set(&deprecated_key(name), bool_str(flags.deprecated)).await?;
        store
            .set(
                &deprecation_message_key(name),
                flags.deprecation_message.as_deref().unwrap_or(""),
            )
            .await?;
        Ok(())
    }

    /// Write the flags of every registered tool. Returns how many were written.
    pub async fn persist_flags<S: FlagStore>(&self, store: &S) -> Result<usize, RepositoryError> {
        let names = self.flag_names();
        for name in &names {
            self.persist_tool_flags(name, store).await?;
        }
        tracing::debug!(tools = names.len(), "persisted tool flags");
        Ok(names.len())
    }

    /// Apply stored flags to registered tools. Returns how many tools changed.
    ///
    /// Unparseable values are ignored with a warning.
    pub async fn restore_flags<S: FlagStore>(&self, store: &S) -> Result<usize, RepositoryError> {
        let mut changed = 0;
        for name in self.flag_names() {
            let enabled = read_bool(store, &enabled_key(&name)).await?;
            let deprecated = read_bool(store, &deprecated_key(&name)).await?;
            let message = store.get(&deprecation_message_key(&name)).await?;
            if enabled.is_none() && deprecated.is_none() && message.is_none() {
                continue;
            }

            if let Some(mut flags) = self.flags.get_mut(&name) {
                let before = flags.clone();
                if let Some(enabled) = enabled {
                    flags.enabled = enabled;
                }
                if let Some(deprecated) = deprecated {
                    flags.deprecated = deprecated;
                }
                if let Some(message) = message {
                    flags.deprecation_message = Some(message).filter(|m| !m.trim().is_empty());
                }
                if *flags != before {
                    changed += 1;
                }
            }
        }
        tracing::info!(changed, "restored tool flags");
        Ok(changed)
    }

    fn flag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.flags.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

async fn read_bool<S: FlagStore>(store: &S, key: &str) -> Result<Option<bool>, RepositoryError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match raw.trim() {
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => {
            tracing::warn!(key, value = other, "ignoring unparseable flag value");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use toolweave_types::error::ToolError;
    use toolweave_types::tool::{CallerContext, ToolDescriptor};

    use super::*;
    use crate::registry::handler::FnTool;
    use crate::storage::flag_store::MemoryFlagStore;

    async fn registry_with(names: &[&str]) -> ToolRegistry {
        let registry = ToolRegistry::default();
        for name in names {
            registry
                .register(
                    ToolDescriptor::new(*name, "1.0.0"),
                    FnTool::new(|input: Value, _caller: CallerContext| async move {
                        Ok::<_, ToolError>(input)
                    }),
                )
                .await;
        }
        registry
    }

    #[tokio::test]
    async fn test_persist_then_restore_into_fresh_registry() {
        let store = MemoryFlagStore::new();
        let first = registry_with(&["echo", "fetch"]).await;
        first.set_enabled("fetch", false).unwrap();
        first.set_deprecated("echo", true, Some("use echo2".into())).unwrap();
        assert_eq!(first.persist_flags(&store).await.unwrap(), 2);
        assert_eq!(store.len(), 6);

        let second = registry_with(&["echo", "fetch"]).await;
        assert_eq!(second.restore_flags(&store).await.unwrap(), 2);
        assert!(!second.flags("fetch").unwrap().enabled);
        let echo = second.flags("echo").unwrap();
        assert!(echo.deprecated);
        assert_eq!(echo.deprecation_message.as_deref(), Some("use echo2"));
        assert_eq!(second.flags("fetch").unwrap().deprecation_message, None);

        let inv = second
            .invoke_detailed("echo", json!({}), &CallerContext::default())
            .await
            .unwrap();
        assert_eq!(inv.warnings, vec!["use echo2".to_string()]);

        let err = second
            .invoke("fetch", json!({}), &CallerContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::Disabled("fetch".into()));
    }

    #[tokio::test]
    async fn test_restore_ignores_garbage_and_unknown_tools() {
        let store = MemoryFlagStore::new();
        store.set(&enabled_key("echo"), "maybe").await.unwrap();
        store.set(&enabled_key("ghost"), "false").await.unwrap();

        let registry = registry_with(&["echo"]).await;
        assert_eq!(registry.restore_flags(&store).await.unwrap(), 0);
        assert!(registry.flags("echo").unwrap().enabled);
    }
}
