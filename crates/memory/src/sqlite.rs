//! SQLite metadata store.
//!
//! Uses a single SQLite database file with three tables:
//! - `system_settings`: admin-controlled key/value settings (API keys, hosts)
//! - `chat_messages`: per-session transcript rows
//! - `profiles`: user display names

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use docmind_core::error::MemoryError;
use docmind_core::message::{ConversationTurn, Role};
use docmind_core::store::{HistoryStore, MetadataStore, ProfileStore, SettingsStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// A SQLite-backed metadata store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let in_memory = path.contains(":memory:");
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to :memory: is a separate database.
        let max_connections = if in_memory { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite metadata store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS system_settings (
                key    TEXT PRIMARY KEY,
                value  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("system_settings table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("chat_messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("session index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id         TEXT PRIMARY KEY,
                full_name  TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("profiles table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Timestamps are stored as fixed-width RFC 3339 so text order is time order.
    fn format_timestamp(ts: &chrono::DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, MemoryError> {
        let role: String = row
            .try_get("role")
            .map_err(|e| MemoryError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MemoryError::QueryFailed(format!("created_at value: {e}")))?;

        Ok(ConversationTurn {
            role: Role::from_stored(&role),
            content,
            created_at,
        })
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn load_settings(&self) -> Result<HashMap<String, String>, MemoryError> {
        let rows = sqlx::query("SELECT key, value FROM system_settings")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("settings: {e}")))?;

        rows.iter()
            .map(|row| {
                let key: String = row
                    .try_get("key")
                    .map_err(|e| MemoryError::QueryFailed(format!("key column: {e}")))?;
                let value: String = row
                    .try_get("value")
                    .map_err(|e| MemoryError::QueryFailed(format!("value column: {e}")))?;
                Ok((key, value))
            })
            .collect()
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("settings upsert failed: {e}")))?;
        debug!(key, "Stored setting");
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT role, content, created_at FROM chat_messages
            WHERE session_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("history: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn append_turn(&self, session_id: &str, turn: ConversationTurn) -> Result<(), MemoryError> {
        sqlx::query(
            "INSERT INTO chat_messages (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(Self::format_timestamp(&turn.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn full_name(&self, user_id: &str) -> Result<Option<String>, MemoryError> {
        let row = sqlx::query("SELECT full_name FROM profiles WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("profile: {e}")))?;

        match row {
            Some(row) => row
                .try_get::<Option<String>, _>("full_name")
                .map_err(|e| MemoryError::QueryFailed(format!("full_name column: {e}"))),
            None => Ok(None),
        }
    }

    async fn put_profile(&self, user_id: &str, full_name: &str) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET full_name = excluded.full_name
            "#,
        )
        .bind(user_id)
        .bind(full_name)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("profile upsert failed: {e}")))?;
        Ok(())
    }
}

impl MetadataStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }
}
