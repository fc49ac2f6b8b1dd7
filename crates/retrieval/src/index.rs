//! Vector similarity index.
//!
//! The `VectorIndex` trait is the seam for external vector databases; the
//! bundled [`InMemoryIndex`] ranks by cosine similarity over a plain vector
//! of embeddings. Snapshot semantics: a search sees every embedding added
//! before the search started; an add racing a search may or may not be
//! visible — no atomicity is guaranteed across that race.

use crate::embed::{Embedder, Embedding};
use async_trait::async_trait;
use hearth_core::error::RetrievalError;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// One search result. `distance` ascends: closer first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: serde_json::Value,
    pub distance: f32,
}

/// Top-K nearest-neighbor search over stored embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Append embeddings to the index.
    async fn add(&self, embeddings: Vec<Embedding>) -> Result<(), RetrievalError>;

    /// Search by query text, embedding it with the given embedder.
    async fn search(
        &self,
        query: &str,
        embedder: &dyn Embedder,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError>;

    /// Number of stored embeddings.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop everything.
    async fn clear(&self) -> Result<(), RetrievalError>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical direction, 0 = orthogonal.
/// Returns 0.0 for empty, mismatched, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Brute-force in-memory index.
pub struct InMemoryIndex {
    entries: RwLock<Vec<Embedding>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add(&self, embeddings: Vec<Embedding>) -> Result<(), RetrievalError> {
        let mut entries = self.entries.write().await;
        entries.extend(embeddings);
        debug!(total = entries.len(), "Index updated");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        embedder: &dyn Embedder,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let query_vectors = embedder.embed(&[query.to_string()]).await?;
        let Some(query_vector) = query_vectors.first() else {
            return Ok(Vec::new());
        };

        let entries = self.entries.read().await;
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|e| SearchHit {
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                distance: 1.0 - cosine_similarity(&e.vector, query_vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
