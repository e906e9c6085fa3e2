//! Session persistence backends for sandloop.
//!
//! The store is an external collaborator as far as the loop is concerned:
//! per-(user, session) append-only message log, per-session definitions,
//! expiry set on first write. Two backends: SQLite for deployments,
//! in-memory for tests and ephemeral use.

pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use sandloop_config::AppConfig;
use sandloop_core::error::StoreError;
use sandloop_core::store::SessionStore;
use std::sync::Arc;

/// Build the configured session store.
pub async fn from_config(config: &AppConfig) -> Result<Arc<dyn SessionStore>, StoreError> {
    let ttl = std::time::Duration::from_secs(config.store.ttl_secs);
    match config.store.backend.as_str() {
        "in_memory" => Ok(Arc::new(MemoryStore::new(ttl))),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteStore::new(&config.store.path, ttl).await?)),
        other => Err(StoreError::Storage(format!(
            "unknown store backend: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_builds_in_memory() {
        let mut config = AppConfig::default();
        config.store.backend = "in_memory".into();
        let store = from_config(&config).await.unwrap();
        assert_eq!(store.name(), "in_memory");
    }

    #[tokio::test]
    async fn factory_rejects_unknown_backend() {
        let mut config = AppConfig::default();
        config.store.backend = "etcd".into();
        assert!(from_config(&config).await.is_err());
    }
}
