//! Hub files — the portable export/import format for a conversation.
//!
//! A hub file is a single JSON document (camelCase keys on the wire):
//!
//! ```json
//! {
//!   "version": 1,
//!   "chatId": "…",
//!   "messages": [{"role", "content", "timestamp", "model",
//!                 "searchResults", "searchSummary", "files"}],
//!   "folderContext": "…",
//!   "metadata": {"created", "messageCount", "title"}
//! }
//! ```
//!
//! Export omits `system` rows — those exist only for internal
//! folder-context bookkeeping and travel in the `folderContext` field
//! instead. Import rejects any payload without a `messages` array.

use crate::log::{PersistedTurn, TurnLog};
use hearth_core::error::MemoryError;
use hearth_core::message::Role;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Current hub format version.
pub const HUB_VERSION: u32 = 1;

/// Metadata key marking a system row as folder-context bookkeeping.
const FOLDER_CONTEXT_KEY: &str = "folderContext";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubFile {
    pub version: u32,
    pub chat_id: String,
    pub messages: Vec<HubMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_context: Option<String>,
    pub metadata: HubMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub search_results: Vec<serde_json::Value>,
    #[serde(default)]
    pub search_summary: String,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubMetadata {
    pub created: String,
    pub message_count: usize,
    pub title: String,
}

fn metadata_string(turn: &PersistedTurn, key: &str) -> String {
    turn.metadata
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn metadata_array(turn: &PersistedTurn, key: &str) -> Vec<serde_json::Value> {
    turn.metadata
        .get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Export a chat from the turn log to a hub file.
///
/// System rows are dropped from `messages`; the most recent folder-context
/// row, if any, becomes the `folderContext` field.
pub async fn export_hub(
    log: &TurnLog,
    chat_id: &str,
    title: &str,
) -> Result<HubFile, MemoryError> {
    let history = log.history(chat_id).await?;

    let folder_context = history
        .iter()
        .rev()
        .find(|t| t.role == Role::System && t.metadata.contains_key(FOLDER_CONTEXT_KEY))
        .map(|t| t.content.clone());

    let messages: Vec<HubMessage> = history
        .iter()
        .filter(|t| t.role != Role::System)
        .map(|t| HubMessage {
            role: t.role.as_str().to_string(),
            content: t.content.clone(),
            timestamp: t.timestamp.to_rfc3339(),
            model: metadata_string(t, "model"),
            search_results: metadata_array(t, "searchResults"),
            search_summary: metadata_string(t, "searchSummary"),
            files: metadata_array(t, "files"),
        })
        .collect();

    let message_count = messages.len();
    info!(chat_id, message_count, "Exported hub file");

    Ok(HubFile {
        version: HUB_VERSION,
        chat_id: chat_id.to_string(),
        messages,
        folder_context,
        metadata: HubMetadata {
            created: chrono::Utc::now().to_rfc3339(),
            message_count,
            title: title.to_string(),
        },
    })
}

/// Import a hub payload into a chat, returning the number of imported turns.
///
/// Takes the raw JSON value so malformed payloads are rejected with a clear
/// error before anything is written: a payload with no `messages` array is
/// refused outright.
pub async fn import_hub(
    log: &TurnLog,
    chat_id: &str,
    payload: &serde_json::Value,
) -> Result<usize, MemoryError> {
    if !payload
        .get("messages")
        .map(|m| m.is_array())
        .unwrap_or(false)
    {
        return Err(MemoryError::InvalidHubFile(
            "payload has no messages array".into(),
        ));
    }

    let hub: HubFile = serde_json::from_value(payload.clone())
        .map_err(|e| MemoryError::InvalidHubFile(e.to_string()))?;

    for message in &hub.messages {
        let mut metadata = serde_json::Map::new();
        if !message.model.is_empty() {
            metadata.insert("model".into(), serde_json::json!(message.model));
        }
        if !message.search_results.is_empty() {
            metadata.insert("searchResults".into(), serde_json::json!(message.search_results));
        }
        if !message.search_summary.is_empty() {
            metadata.insert("searchSummary".into(), serde_json::json!(message.search_summary));
        }
        if !message.files.is_empty() {
            metadata.insert("files".into(), serde_json::json!(message.files));
        }

        let timestamp = chrono::DateTime::parse_from_rfc3339(&message.timestamp)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now());

        log.append_turn(PersistedTurn {
            chat_id: chat_id.to_string(),
            role: Role::parse(&message.role),
            content: message.content.clone(),
            timestamp,
            metadata,
        })
        .await?;
    }

    if let Some(folder_context) = &hub.folder_context {
        let mut metadata = serde_json::Map::new();
        metadata.insert(FOLDER_CONTEXT_KEY.into(), serde_json::json!(true));
        log.append(chat_id, Role::System, folder_context, metadata).await?;
    }

    info!(chat_id, imported = hub.messages.len(), "Imported hub file");
    Ok(hub.messages.len())
}
