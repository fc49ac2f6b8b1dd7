//! Completion-service backends for Hearth.
//!
//! - [`OllamaProvider`] — the production backend, talking to a local Ollama
//!   server over its native `/api/chat` NDJSON streaming protocol.
//! - [`ScriptedProvider`] — a deterministic mock that replays a queue of
//!   responses; used by tests and offline dry runs across the workspace.

pub mod mock;
pub mod ollama;

pub use mock::ScriptedProvider;
pub use ollama::OllamaProvider;
