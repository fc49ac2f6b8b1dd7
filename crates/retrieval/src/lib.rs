//! Retrieval pipeline for Hearth.
//!
//! Raw documents are split into overlapping chunks, embedded, and indexed;
//! at query time the index answers top-K nearest-neighbor searches and the
//! hits are formatted for prompt injection. Query enhancement rewrites the
//! user's question before retrieval to improve recall.

pub mod document;
pub mod embed;
pub mod enhance;
pub mod index;
pub mod retrieve;
pub mod splitter;
pub mod store;

pub use document::{Document, DocumentMetadata};
pub use embed::{Embedder, Embedding, HashEmbedder};
pub use enhance::{RewriteMode, hyde_document, rewrite_query};
pub use index::{InMemoryIndex, SearchHit, VectorIndex, cosine_similarity};
pub use retrieve::retrieve_relevant;
pub use splitter::CharacterSplitter;
pub use store::DocumentStore;
