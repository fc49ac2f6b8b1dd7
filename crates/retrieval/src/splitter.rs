//! Character-budget text splitter with overlap.
//!
//! Splits on a separator (paragraph breaks by default), packs splits into
//! chunks up to `chunk_size` characters, and carries the trailing splits of
//! each chunk into the next one for context overlap.

use crate::document::Document;

/// Split text by character count with overlapping windows.
#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl CharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separator: "\n\n".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let splits: Vec<&str> = text.split(self.separator.as_str()).collect();

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for split in splits {
            if current_len + split.len() > self.chunk_size && !current.is_empty() {
                chunks.push(current.join(&self.separator));

                // Keep the tail of the chunk for overlap
                let keep_from = current.len().saturating_sub(self.chunk_overlap);
                current = current.split_off(keep_from);
                current_len = current.iter().map(|s| s.len()).sum::<usize>()
                    + self.separator.len() * current.len().saturating_sub(1);
            }

            current.push(split);
            current_len += split.len() + self.separator.len();
        }

        if !current.is_empty() {
            chunks.push(current.join(&self.separator));
        }

        chunks
    }

    /// Split documents into chunk documents, stamping chunk/chunk_of.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let mut out = Vec::new();

        for doc in documents {
            let splits = self.split_text(&doc.content);
            let total = splits.len();

            for (i, split) in splits.into_iter().enumerate() {
                let mut metadata = doc.metadata.clone();
                metadata.chunk = Some(i + 1);
                metadata.chunk_of = Some(total);
                out.push(Document::new(split, metadata));
            }
        }

        out
    }
}

impl Default for CharacterSplitter {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
