//! Document and chunk types.
//!
//! A `Document` is either a whole source file or one chunk of it; the
//! splitter stamps chunk/chunk_of metadata when it slices. Documents are
//! immutable after creation — the store only ever appends.

use hearth_core::error::RetrievalError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provenance and position of a document or chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source path the content came from.
    pub source: String,

    /// File name component of the source.
    pub filename: String,

    /// 1-based chunk index, when this document is a chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,

    /// Total chunk count of the parent document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_of: Option<usize>,

    /// Page number, for paged formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl DocumentMetadata {
    pub fn for_source(source: impl Into<String>) -> Self {
        let source = source.into();
        let filename = Path::new(&source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.clone());
        Self {
            source,
            filename,
            chunk: None,
            chunk_of: None,
            page: None,
        }
    }
}

/// A document or a chunk of one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// Load a plain-text file as a single document.
///
/// Richer loaders (PDF, CSV) are external collaborators; plain text is
/// enough to drive the pipeline end to end.
pub async fn load_text(path: impl AsRef<Path>) -> Result<Vec<Document>, RetrievalError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RetrievalError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    Ok(vec![Document::new(
        content,
        DocumentMetadata::for_source(path.display().to_string()),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn metadata_extracts_filename() {
        let metadata = DocumentMetadata::for_source("/tmp/reports/q3.txt");
        assert_eq!(metadata.filename, "q3.txt");
        assert_eq!(metadata.source, "/tmp/reports/q3.txt");
    }

    #[tokio::test]
    async fn load_text_reads_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "line one\nline two").unwrap();

        let docs = load_text(file.path()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "line one\nline two");
        assert!(!docs[0].metadata.filename.is_empty());
    }

    #[tokio::test]
    async fn load_text_missing_file_errors() {
        let err = load_text("/no/such/file.txt").await.unwrap_err();
        assert!(matches!(err, RetrievalError::LoadFailed { .. }));
    }
}
