//! SessionStore trait — the contract around the persistent session store.
//!
//! The store is external and opaque: per-(user, session) append-only
//! message log, per-session map from function name to exact source, and a
//! per-session set of import statements. Each keyed set carries an expiry
//! set on its first write. The core reads a snapshot at the start of a turn
//! and writes back a delta at the end — it never owns storage lifecycle.

use crate::definitions::{DefinitionSet, Definitions};
use crate::error::StoreError;
use crate::message::Message;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// The persistent session store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append one message to a session's log.
    async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        message: &Message,
    ) -> std::result::Result<(), StoreError>;

    /// The full ordered message log for a session.
    async fn history(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> std::result::Result<Vec<Message>, StoreError>;

    /// Persist the session's function map (overwrites the stored map).
    async fn save_functions(
        &self,
        user_id: &str,
        session_id: &str,
        functions: &BTreeMap<String, String>,
    ) -> std::result::Result<(), StoreError>;

    /// The session's persisted function map.
    async fn functions(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> std::result::Result<BTreeMap<String, String>, StoreError>;

    /// Persist the session's import list (overwrites the stored list).
    async fn save_imports(
        &self,
        user_id: &str,
        session_id: &str,
        imports: &[String],
    ) -> std::result::Result<(), StoreError>;

    /// The session's persisted import list.
    async fn imports(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> std::result::Result<Vec<String>, StoreError>;

    /// Record a session id under a user.
    async fn add_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> std::result::Result<(), StoreError>;

    /// All session ids recorded for a user.
    async fn sessions(&self, user_id: &str) -> std::result::Result<Vec<String>, StoreError>;

    /// Drop a session's log and definitions.
    async fn clear_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> std::result::Result<(), StoreError>;

    /// Load the session's definition set (functions + imports) in one call.
    async fn definitions(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> std::result::Result<DefinitionSet, StoreError> {
        let functions = self.functions(user_id, session_id).await?;
        let imports = self.imports(user_id, session_id).await?;
        let mut set = DefinitionSet::new();
        set.merge(Definitions { functions, imports });
        Ok(set)
    }

    /// Persist the session's definition set in one call.
    async fn save_definitions(
        &self,
        user_id: &str,
        session_id: &str,
        set: &DefinitionSet,
    ) -> std::result::Result<(), StoreError> {
        self.save_functions(user_id, session_id, &set.functions)
            .await?;
        self.save_imports(user_id, session_id, &set.imports).await
    }
}
