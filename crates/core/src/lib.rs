//! # Hearth Core
//!
//! Domain types, traits, and error definitions for the Hearth assistant
//! backend. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The completion service, the embedder, and the vector index are defined as
//! traits here or in their owning crates. Implementations live in their
//! respective crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod context;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use context::Context;
pub use error::{
    AnalysisError, Error, MemoryError, ProviderError, Result, RetrievalError, SessionError,
};
pub use message::{Message, Role, SessionId};
pub use provider::{Provider, StreamChunk};
