//! Embedding generation.
//!
//! The `Embedder` trait abstracts over vector backends; the bundled
//! [`HashEmbedder`] produces deterministic pseudo-random vectors seeded by
//! the text itself, so retrieval works offline and tests are reproducible.
//! A real sentence-embedding service plugs in behind the same trait.

use crate::document::Document;
use async_trait::async_trait;
use hearth_core::error::RetrievalError;
use serde::{Deserialize, Serialize};

/// A text with its vector representation. 1:1 with a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Turns texts into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The backend name.
    fn name(&self) -> &str;

    /// Vector dimensionality.
    fn dim(&self) -> usize;

    /// Embed a batch of texts, one vector per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;

    /// Embed documents, pairing each chunk with its vector and metadata.
    async fn embed_documents(
        &self,
        documents: &[Document],
    ) -> Result<Vec<Embedding>, RetrievalError> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embed(&texts).await?;

        Ok(documents
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| Embedding {
                text: doc.content.clone(),
                vector,
                metadata: serde_json::to_value(&doc.metadata).unwrap_or_default(),
            })
            .collect())
    }
}

/// Deterministic embedder: FNV-seeded xorshift per text.
///
/// Identical texts map to identical vectors, so exact-content matches rank
/// first; beyond that the geometry is arbitrary. Good enough for offline
/// runs and tests, not a semantic model.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn seed_for(text: &str) -> u64 {
        // FNV-1a over the bytes
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in text.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        // A zero seed would freeze the xorshift generator
        if hash == 0 { 0x9e3779b97f4a7c15 } else { hash }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut state = Self::seed_for(text);
        (0..self.dim)
            .map(|_| {
                // xorshift64*
                state ^= state >> 12;
                state ^= state << 25;
                state ^= state >> 27;
                let value = state.wrapping_mul(0x2545F4914F6CDD1D);
                (value >> 40) as f32 / (1u64 << 24) as f32
            })
            .collect()
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentMetadata;

    #[tokio::test]
    async fn deterministic_per_text() {
        let embedder = HashEmbedder::new(16);
        let a = embedder.embed(&["hello".into()]).await.unwrap();
        let b = embedder.embed(&["hello".into()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_texts_differ() {
        let embedder = HashEmbedder::new(16);
        let vectors = embedder
            .embed(&["hello".into(), "world".into()])
            .await
            .unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn vectors_have_configured_dim() {
        let embedder = HashEmbedder::new(384);
        let vectors = embedder.embed(&["x".into()]).await.unwrap();
        assert_eq!(vectors[0].len(), 384);
        assert_eq!(embedder.dim(), 384);
    }

    #[tokio::test]
    async fn values_bounded() {
        let embedder = HashEmbedder::new(64);
        let vectors = embedder.embed(&["bounded check".into()]).await.unwrap();
        assert!(vectors[0].iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[tokio::test]
    async fn embed_documents_carries_metadata() {
        let embedder = HashEmbedder::new(8);
        let docs = vec![Document::new("body", DocumentMetadata::for_source("f.txt"))];
        let embeddings = embedder.embed_documents(&docs).await.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].text, "body");
        assert_eq!(embeddings[0].metadata["filename"], "f.txt");
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let embedder = HashEmbedder::default();
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
