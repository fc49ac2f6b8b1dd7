//! Conversation memory for Hearth.
//!
//! Three layers, from hot to cold:
//! - **Short-term** — a bounded FIFO of recent messages.
//! - **Long-term** — topic-keyed facts distilled by a background task.
//! - **Summaries** — rolling digests regenerated every few turns.
//!
//! Plus the durable side: an append-only SQLite turn log with a read-through
//! cache, and the portable hub export/import format.

pub mod conversation;
pub mod decode;
pub mod hub;
pub mod log;
pub mod tasks;

pub use conversation::{ConversationMemory, MemoryStats};
pub use decode::decode_topic_map;
pub use hub::{HubFile, HubMessage, HubMetadata};
pub use log::{PersistedTurn, TurnLog};
pub use tasks::{BackgroundTasks, extract_key_facts, generate_summary};
