//! Key-value port for persisting tool flags.
//!
//! The registry only needs `get`/`set` over string keys; implementations
//! live in toolweave-infra (SQLite) or here (in-memory, for tests and
//! ephemeral runs).

use dashmap::DashMap;
use toolweave_types::error::RepositoryError;

/// Narrow key-value collaborator for flag persistence.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait FlagStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Process-local flag store backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    entries: DashMap<String, String>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FlagStore for MemoryFlagStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
