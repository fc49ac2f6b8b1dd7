//! Process-wide document store.
//!
//! Append-only from the write side, snapshot-readable from the search side.
//! Chunks are indexed by source path so a whole document can be
//! reassembled for the analysis orchestrators.

use crate::document::Document;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

struct StoreState {
    documents: Vec<Document>,
    /// source path → indices into `documents`
    by_source: HashMap<String, Vec<usize>>,
}

/// In-memory chunk store shared by every session.
pub struct DocumentStore {
    state: RwLock<StoreState>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                documents: Vec::new(),
                by_source: HashMap::new(),
            }),
        }
    }

    /// Append documents. Existing entries are never mutated or removed.
    pub async fn add_documents(&self, documents: Vec<Document>) {
        let mut state = self.state.write().await;
        for doc in documents {
            let source = doc.metadata.source.clone();
            state.documents.push(doc);
            let index = state.documents.len() - 1;
            state.by_source.entry(source).or_default().push(index);
        }
        debug!(total = state.documents.len(), "Document store updated");
    }

    /// Snapshot of every stored document.
    pub async fn documents(&self) -> Vec<Document> {
        self.state.read().await.documents.clone()
    }

    /// All chunks whose file name contains `name` (case-insensitive),
    /// in insertion order.
    pub async fn by_name(&self, name: &str) -> Vec<Document> {
        let needle = name.to_lowercase();
        let state = self.state.read().await;
        state
            .documents
            .iter()
            .filter(|d| d.metadata.filename.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Reassemble a named document's chunks into formatted sections.
    /// Returns an empty vec when nothing matches.
    pub async fn complete_document(&self, name: &str) -> Vec<String> {
        self.by_name(name)
            .await
            .iter()
            .map(crate::retrieve::format_document)
            .collect()
    }

    /// Distinct source paths, in first-seen order.
    pub async fn sources(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut seen = std::collections::HashSet::new();
        state
            .documents
            .iter()
            .filter(|d| seen.insert(d.metadata.source.clone()))
            .map(|d| d.metadata.source.clone())
            .collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.documents.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentMetadata;

    fn doc(source: &str, content: &str) -> Document {
        Document::new(content, DocumentMetadata::for_source(source))
    }

    #[tokio::test]
    async fn add_and_list() {
        let store = DocumentStore::new();
        assert!(store.is_empty().await);

        store
            .add_documents(vec![doc("a.txt", "alpha"), doc("b.txt", "beta")])
            .await;
        assert_eq!(store.len().await, 2);
        assert!(!store.is_empty().await);
    }

    #[tokio::test]
    async fn by_name_is_case_insensitive_containment() {
        let store = DocumentStore::new();
        store
            .add_documents(vec![
                doc("/data/Report-Q3.txt", "q3 numbers"),
                doc("/data/notes.txt", "misc"),
            ])
            .await;

        let hits = store.by_name("report").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "q3 numbers");

        assert!(store.by_name("missing").await.is_empty());
    }

    #[tokio::test]
    async fn chunks_of_same_source_group_together() {
        let store = DocumentStore::new();
        store
            .add_documents(vec![doc("x.txt", "chunk one"), doc("x.txt", "chunk two")])
            .await;

        let sections = store.complete_document("x.txt").await;
        assert_eq!(sections.len(), 2);
        assert!(sections[0].contains("chunk one"));
        assert!(sections[1].contains("chunk two"));
    }

    #[tokio::test]
    async fn sources_deduplicated_in_order() {
        let store = DocumentStore::new();
        store
            .add_documents(vec![doc("a.txt", "1"), doc("b.txt", "2"), doc("a.txt", "3")])
            .await;
        assert_eq!(store.sources().await, vec!["a.txt", "b.txt"]);
    }
}
