//! Session layer for Hearth.
//!
//! Owns the pieces that turn one inbound user message into one reply:
//! token estimation, the context assembler/truncator, the concurrent-safe
//! session table, and the per-turn pipeline that wires memory, retrieval,
//! and the completion service together.

pub mod assembler;
pub mod manager;
pub mod pipeline;
pub mod token;

pub use assembler::{DEFAULT_TOKEN_BUDGET, fit_to_budget};
pub use manager::{Session, SessionManager};
pub use pipeline::{TurnEngine, TurnOutcome};
pub use token::{estimate_context_tokens, estimate_tokens};
