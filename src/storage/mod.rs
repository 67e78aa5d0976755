use crate::error::StorageError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Transient UI/turn record. Mirrored into per-day local storage and
/// superseded entirely on the next day boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    User,
    Ai,
}

impl MessageKind {
    /// Role name the upstream chat API expects for this kind.
    pub fn as_chat_role(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "assistant",
        }
    }
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::User,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Ai,
            text: text.into(),
        }
    }
}

/// Today's storage key (YYYY-MM-DD, local time).
pub fn today_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// On-device key-value state: a per-calendar-day message history and a flat
/// pantry list. Written from a single caller at a time; the pool is the only
/// synchronization needed.
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Open(format!("{}: {e}", parent.display())))?;
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| StorageError::Open(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests and ephemeral runs. Pinned to a single
    /// connection: each new in-memory connection is a separate database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 day TEXT NOT NULL,
                 kind TEXT NOT NULL,
                 text TEXT NOT NULL
             )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pantry (
                 item TEXT PRIMARY KEY
             )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // ── Per-day message history ─────────────────────────────────

    pub async fn append_message(
        &self,
        day: &str,
        message: &ChatMessage,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO messages (day, kind, text) VALUES ($1, $2, $3)")
            .bind(day)
            .bind(message.kind.to_string())
            .bind(&message.text)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn messages_for(&self, day: &str) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query("SELECT kind, text FROM messages WHERE day = $1 ORDER BY id")
            .bind(day)
            .fetch_all(&self.pool)
            .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            let kind = MessageKind::from_str(&kind)
                .map_err(|_| StorageError::Open(format!("unknown message kind: {kind}")))?;
            messages.push(ChatMessage {
                kind,
                text: row.get("text"),
            });
        }
        Ok(messages)
    }

    /// Opportunistic purge: drop history for every day except the given one.
    pub async fn purge_except(&self, day: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM messages WHERE day != $1")
            .bind(day)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ── Pantry ──────────────────────────────────────────────────

    pub async fn pantry_items(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT item FROM pantry ORDER BY item")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("item")).collect())
    }

    pub async fn add_pantry_item(&self, item: &str) -> Result<(), StorageError> {
        sqlx::query("INSERT OR IGNORE INTO pantry (item) VALUES ($1)")
            .bind(item.trim())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_pantry_item(&self, item: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM pantry WHERE item = $1")
            .bind(item)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
