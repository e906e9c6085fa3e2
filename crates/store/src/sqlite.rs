//! SQLite session store.
//!
//! One database file, four tables:
//! - `sessions`     — (user, session) registry; carries the expiry stamped
//!   on the session's first write
//! - `messages`     — append-only per-session log (JSON-encoded messages)
//! - `functions`    — per-session name → exact source text
//! - `imports`      — per-session import statements, insertion-ordered
//!
//! Expiry is enforced on read (expired sessions read as empty) and
//! reclaimed by `purge_expired`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sandloop_core::error::StoreError;
use sandloop_core::message::Message;
use sandloop_core::store::SessionStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;

/// A SQLite-backed session store.
pub struct SqliteStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &str, ttl: std::time::Duration) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(86_400)),
        };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for ddl in [
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                user_id    TEXT NOT NULL,
                session_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (user_id, session_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    TEXT NOT NULL,
                session_id TEXT NOT NULL,
                message    TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS functions (
                user_id    TEXT NOT NULL,
                session_id TEXT NOT NULL,
                name       TEXT NOT NULL,
                source     TEXT NOT NULL,
                PRIMARY KEY (user_id, session_id, name)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS imports (
                user_id    TEXT NOT NULL,
                session_id TEXT NOT NULL,
                position   INTEGER NOT NULL,
                statement  TEXT NOT NULL,
                PRIMARY KEY (user_id, session_id, position)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(user_id, session_id)",
        ] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("migration failed: {e}")))?;
        }
        Ok(())
    }

    /// Register the session if unseen, stamping its expiry. First write
    /// wins; later writes never refresh the deadline.
    async fn touch_session(&self, user_id: &str, session_id: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT OR IGNORE INTO sessions (user_id, session_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(now.to_rfc3339())
        .bind((now + self.ttl).to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Is the session registered and unexpired?
    async fn session_live(&self, user_id: &str, session_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT 1 FROM sessions WHERE user_id = ? AND session_id = ? AND expires_at > ?",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Delete expired sessions and their dependent rows. Returns the number
    /// of sessions reclaimed.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now().to_rfc3339();
        for table in ["messages", "functions", "imports"] {
            let sql = format!(
                "DELETE FROM {table} WHERE (user_id, session_id) IN
                 (SELECT user_id, session_id FROM sessions WHERE expires_at <= ?)"
            );
            sqlx::query(&sql)
                .bind(&now)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        message: &Message,
    ) -> Result<(), StoreError> {
        self.touch_session(user_id, session_id).await?;
        let encoded =
            serde_json::to_string(message).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query("INSERT INTO messages (user_id, session_id, message) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(session_id)
            .bind(encoded)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn history(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        if !self.session_live(user_id, session_id).await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT message FROM messages WHERE user_id = ? AND session_id = ? ORDER BY iid",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let raw: String = row.get("message");
                serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }

    async fn save_functions(
        &self,
        user_id: &str,
        session_id: &str,
        functions: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.touch_session(user_id, session_id).await?;
        for (name, source) in functions {
            sqlx::query(
                "INSERT INTO functions (user_id, session_id, name, source) VALUES (?, ?, ?, ?)
                 ON CONFLICT(user_id, session_id, name) DO UPDATE SET source = excluded.source",
            )
            .bind(user_id)
            .bind(session_id)
            .bind(name)
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn functions(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.session_live(user_id, session_id).await? {
            return Ok(BTreeMap::new());
        }
        let rows = sqlx::query(
            "SELECT name, source FROM functions WHERE user_id = ? AND session_id = ?",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("name"), row.get("source")))
            .collect())
    }

    async fn save_imports(
        &self,
        user_id: &str,
        session_id: &str,
        imports: &[String],
    ) -> Result<(), StoreError> {
        self.touch_session(user_id, session_id).await?;
        // The import list is small and insertion-ordered; simplest correct
        // write is replace-all.
        sqlx::query("DELETE FROM imports WHERE user_id = ? AND session_id = ?")
            .bind(user_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        for (position, statement) in imports.iter().enumerate() {
            sqlx::query(
                "INSERT INTO imports (user_id, session_id, position, statement) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(session_id)
            .bind(position as i64)
            .bind(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn imports(&self, user_id: &str, session_id: &str) -> Result<Vec<String>, StoreError> {
        if !self.session_live(user_id, session_id).await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT statement FROM imports WHERE user_id = ? AND session_id = ? ORDER BY position",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.get("statement")).collect())
    }

    async fn add_session(&self, user_id: &str, session_id: &str) -> Result<(), StoreError> {
        self.touch_session(user_id, session_id).await
    }

    async fn sessions(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT session_id FROM sessions WHERE user_id = ? AND expires_at > ? ORDER BY created_at",
        )
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.get("session_id")).collect())
    }

    async fn clear_session(&self, user_id: &str, session_id: &str) -> Result<(), StoreError> {
        for table in ["messages", "functions", "imports", "sessions"] {
            let sql = format!("DELETE FROM {table} WHERE user_id = ? AND session_id = ?");
            sqlx::query(&sql)
                .bind(user_id)
                .bind(session_id)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(ttl: std::time::Duration) -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let store = SqliteStore::new(path.to_str().unwrap(), ttl).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn message_log_roundtrip() {
        let (s, _dir) = store(std::time::Duration::from_secs(3600)).await;
        s.append_message("u1", "s1", &Message::user("hello"))
            .await
            .unwrap();
        s.append_message("u1", "s1", &Message::assistant("hi"))
            .await
            .unwrap();

        let history = s.history("u1", "s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content.as_text(), "hello");
    }

    #[tokio::test]
    async fn function_upsert_keeps_latest_source() {
        let (s, _dir) = store(std::time::Duration::from_secs(3600)).await;
        let mut v1 = BTreeMap::new();
        v1.insert("f".to_string(), "def f():\n    return 1\n".to_string());
        s.save_functions("u1", "s1", &v1).await.unwrap();

        let mut v2 = BTreeMap::new();
        v2.insert("f".to_string(), "def f():\n    return 2\n".to_string());
        s.save_functions("u1", "s1", &v2).await.unwrap();

        let loaded = s.functions("u1", "s1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded["f"].contains("return 2"));
    }

    #[tokio::test]
    async fn imports_keep_insertion_order() {
        let (s, _dir) = store(std::time::Duration::from_secs(3600)).await;
        let imports = vec![
            "import math".to_string(),
            "from datetime import date".to_string(),
        ];
        s.save_imports("u1", "s1", &imports).await.unwrap();
        assert_eq!(s.imports("u1", "s1").await.unwrap(), imports);
    }

    #[tokio::test]
    async fn expired_session_reads_empty_and_purges() {
        let (s, _dir) = store(std::time::Duration::ZERO).await;
        s.append_message("u1", "s1", &Message::user("gone"))
            .await
            .unwrap();

        assert!(s.history("u1", "s1").await.unwrap().is_empty());
        assert_eq!(s.purge_expired().await.unwrap(), 1);
        assert!(s.sessions("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_session_removes_everything() {
        let (s, _dir) = store(std::time::Duration::from_secs(3600)).await;
        s.append_message("u1", "s1", &Message::user("x")).await.unwrap();
        s.save_imports("u1", "s1", &["import re".to_string()])
            .await
            .unwrap();

        s.clear_session("u1", "s1").await.unwrap();
        assert!(s.history("u1", "s1").await.unwrap().is_empty());
        assert!(s.imports("u1", "s1").await.unwrap().is_empty());
    }
}
