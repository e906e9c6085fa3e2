//! In-memory store — useful for testing and ephemeral deployments.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sandloop_core::error::StoreError;
use sandloop_core::message::Message;
use sandloop_core::store::SessionStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Everything stored for one (user, session) pair.
#[derive(Debug, Default, Clone)]
struct SessionRecord {
    messages: Vec<Message>,
    functions: BTreeMap<String, String>,
    imports: Vec<String>,
    /// Set on the record's first write, never refreshed.
    expires_at: Option<DateTime<Utc>>,
}

/// An in-memory session store keyed by (user, session).
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<(String, String), SessionRecord>>>,
    user_sessions: Arc<RwLock<HashMap<String, Vec<String>>>>,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            user_sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(86_400)),
        }
    }

    fn key(user_id: &str, session_id: &str) -> (String, String) {
        (user_id.to_string(), session_id.to_string())
    }

    fn live(record: &SessionRecord) -> bool {
        match record.expires_at {
            Some(deadline) => Utc::now() < deadline,
            None => true,
        }
    }

    /// Fetch a record for writing, stamping the expiry on first write.
    async fn record_mut<R>(
        &self,
        user_id: &str,
        session_id: &str,
        f: impl FnOnce(&mut SessionRecord) -> R,
    ) -> R {
        let mut records = self.records.write().await;
        let record = records
            .entry(Self::key(user_id, session_id))
            .or_insert_with(|| SessionRecord {
                expires_at: Some(Utc::now() + self.ttl),
                ..Default::default()
            });
        f(record)
    }

    async fn record<R: Default>(
        &self,
        user_id: &str,
        session_id: &str,
        f: impl FnOnce(&SessionRecord) -> R,
    ) -> R {
        let records = self.records.read().await;
        match records.get(&Self::key(user_id, session_id)) {
            Some(record) if Self::live(record) => f(record),
            _ => R::default(),
        }
    }

    /// Drop every expired record. Callers decide when to sweep.
    pub async fn purge_expired(&self) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| Self::live(record));
        before - records.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        message: &Message,
    ) -> Result<(), StoreError> {
        let message = message.clone();
        self.record_mut(user_id, session_id, |r| r.messages.push(message))
            .await;
        Ok(())
    }

    async fn history(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .record(user_id, session_id, |r| r.messages.clone())
            .await)
    }

    async fn save_functions(
        &self,
        user_id: &str,
        session_id: &str,
        functions: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let functions = functions.clone();
        self.record_mut(user_id, session_id, |r| r.functions = functions)
            .await;
        Ok(())
    }

    async fn functions(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self
            .record(user_id, session_id, |r| r.functions.clone())
            .await)
    }

    async fn save_imports(
        &self,
        user_id: &str,
        session_id: &str,
        imports: &[String],
    ) -> Result<(), StoreError> {
        let imports = imports.to_vec();
        self.record_mut(user_id, session_id, |r| r.imports = imports)
            .await;
        Ok(())
    }

    async fn imports(&self, user_id: &str, session_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.record(user_id, session_id, |r| r.imports.clone()).await)
    }

    async fn add_session(&self, user_id: &str, session_id: &str) -> Result<(), StoreError> {
        let mut sessions = self.user_sessions.write().await;
        let list = sessions.entry(user_id.to_string()).or_default();
        if !list.contains(&session_id.to_string()) {
            list.push(session_id.to_string());
        }
        Ok(())
    }

    async fn sessions(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .user_sessions
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_session(&self, user_id: &str, session_id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(&Self::key(user_id, session_id));
        if let Some(list) = self.user_sessions.write().await.get_mut(user_id) {
            list.retain(|s| s != session_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(std::time::Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn history_is_append_only_and_ordered() {
        let s = store();
        s.append_message("u1", "s1", &Message::user("first"))
            .await
            .unwrap();
        s.append_message("u1", "s1", &Message::assistant("second"))
            .await
            .unwrap();

        let history = s.history("u1", "s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content.as_text(), "first");
        assert_eq!(history[1].content.as_text(), "second");
    }

    #[tokio::test]
    async fn definitions_roundtrip() {
        let s = store();
        let mut functions = BTreeMap::new();
        functions.insert("f".to_string(), "def f(x):\n    return x + 999\n".to_string());
        s.save_functions("u1", "s1", &functions).await.unwrap();
        s.save_imports("u1", "s1", &["import math".to_string()])
            .await
            .unwrap();

        let set = s.definitions("u1", "s1").await.unwrap();
        assert!(set.functions["f"].contains("999"));
        assert_eq!(set.imports, vec!["import math".to_string()]);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let s = store();
        s.append_message("u1", "s1", &Message::user("one")).await.unwrap();
        s.append_message("u1", "s2", &Message::user("two")).await.unwrap();

        assert_eq!(s.history("u1", "s1").await.unwrap().len(), 1);
        assert_eq!(s.history("u1", "s2").await.unwrap().len(), 1);
        assert!(s.history("u2", "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_records_read_empty() {
        let s = MemoryStore::new(std::time::Duration::ZERO);
        s.append_message("u1", "s1", &Message::user("gone"))
            .await
            .unwrap();

        assert!(s.history("u1", "s1").await.unwrap().is_empty());
        assert_eq!(s.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn session_listing_tracks_and_clears() {
        let s = store();
        s.add_session("u1", "s1").await.unwrap();
        s.add_session("u1", "s2").await.unwrap();
        s.add_session("u1", "s1").await.unwrap(); // dedup

        assert_eq!(s.sessions("u1").await.unwrap(), vec!["s1", "s2"]);

        s.clear_session("u1", "s1").await.unwrap();
        assert_eq!(s.sessions("u1").await.unwrap(), vec!["s2"]);
    }
}
