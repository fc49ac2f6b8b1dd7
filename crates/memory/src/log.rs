//! The persisted conversation log.
//!
//! One append-only SQLite table, one row per turn. The in-memory per-chat
//! message cache is a lazily-populated read-through cache over this table:
//! once loaded, cache contents equal the persisted rows in timestamp order.

use hearth_core::error::MemoryError;
use hearth_core::message::Role;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One durable conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedTurn {
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Append-only turn log backed by SQLite, with a read-through cache.
pub struct TurnLog {
    pool: SqlitePool,
    cache: RwLock<HashMap<String, Vec<PersistedTurn>>>,
}

impl TurnLog {
    /// Open (or create) the log at the given path.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn open(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let log = Self {
            pool,
            cache: RwLock::new(HashMap::new()),
        };
        log.run_migrations().await?;
        info!("Conversation log initialized at {path}");
        Ok(log)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                chat_id   TEXT NOT NULL,
                role      TEXT NOT NULL,
                content   TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                metadata  TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("conversations table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_chat
             ON conversations(chat_id, timestamp)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("chat index: {e}")))?;

        debug!("Conversation log migrations complete");
        Ok(())
    }

    /// Append one turn. The cache is updated only when the chat is already
    /// loaded; otherwise the next `history` call reads the row back.
    pub async fn append(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), MemoryError> {
        let turn = PersistedTurn {
            chat_id: chat_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            metadata,
        };
        self.append_turn(turn).await
    }

    /// Append a pre-built turn (hub import keeps the original timestamps).
    pub async fn append_turn(&self, turn: PersistedTurn) -> Result<(), MemoryError> {
        let metadata_json = serde_json::to_string(&turn.metadata)
            .map_err(|e| MemoryError::Storage(format!("Metadata serialization: {e}")))?;

        sqlx::query(
            "INSERT INTO conversations (chat_id, role, content, timestamp, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&turn.chat_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.timestamp.to_rfc3339())
        .bind(&metadata_json)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;

        let mut cache = self.cache.write().await;
        // Cache order must mirror timestamp order. An append that lands out
        // of order (hub import with historic timestamps) drops the cached
        // copy so the next read rebuilds it from the table.
        let out_of_order = cache
            .get(&turn.chat_id)
            .and_then(|turns| turns.last())
            .is_some_and(|last| last.timestamp > turn.timestamp);
        if out_of_order {
            cache.remove(&turn.chat_id);
        } else if let Some(turns) = cache.get_mut(&turn.chat_id) {
            turns.push(turn);
        }
        Ok(())
    }

    /// All turns for a chat, oldest first. Loads from SQLite on first
    /// access, then serves from the cache.
    pub async fn history(&self, chat_id: &str) -> Result<Vec<PersistedTurn>, MemoryError> {
        {
            let cache = self.cache.read().await;
            if let Some(turns) = cache.get(chat_id) {
                return Ok(turns.clone());
            }
        }

        let rows = sqlx::query(
            "SELECT chat_id, role, content, timestamp, metadata
             FROM conversations WHERE chat_id = ?1
             ORDER BY timestamp, rowid",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("History query: {e}")))?;

        let turns: Vec<PersistedTurn> = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<_, _>>()?;

        debug!(chat_id, turns = turns.len(), "Loaded chat history into cache");
        let mut cache = self.cache.write().await;
        // A concurrent loader may have beaten us here; either copy is the
        // same persisted rows, so last-write-wins is fine.
        cache.insert(chat_id.to_string(), turns.clone());
        Ok(turns)
    }

    /// The chat rendered as `Role: content` lines for prompt context.
    pub async fn transcript(&self, chat_id: &str) -> Result<String, MemoryError> {
        let history = self.history(chat_id).await?;
        let lines: Vec<String> = history
            .iter()
            .map(|t| format!("{}: {}", capitalize(t.role.as_str()), t.content))
            .collect();
        Ok(lines.join("\n"))
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<PersistedTurn, MemoryError> {
        let chat_id: String = row
            .try_get("chat_id")
            .map_err(|e| MemoryError::QueryFailed(format!("chat_id column: {e}")))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| MemoryError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| MemoryError::QueryFailed(format!("timestamp column: {e}")))?;
        let metadata_json: Option<String> = row
            .try_get("metadata")
            .map_err(|e| MemoryError::QueryFailed(format!("metadata column: {e}")))?;

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now());

        let metadata = metadata_json
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        Ok(PersistedTurn {
            chat_id,
            role: Role::parse(&role),
            content,
            timestamp,
            metadata,
        })
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
