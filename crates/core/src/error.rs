//! Error types for the Hearth domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Hearth operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Analysis errors ---
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid hub file: {0}")]
    InvalidHubFile(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Document load failed: {path} — {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Index query failed: {0}")]
    IndexFailed(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Execution timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Synthesis stage failed: {stage} — {reason}")]
    StageFailed { stage: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 500,
            message: "model runner crashed".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("model runner crashed"));
    }

    #[test]
    fn analysis_error_displays_correctly() {
        let err = Error::Analysis(AnalysisError::Timeout { timeout_secs: 60 });
        assert!(err.to_string().contains("60"));
    }

    #[test]
    fn memory_error_converts() {
        let err: Error = MemoryError::InvalidHubFile("no messages array".into()).into();
        assert!(err.to_string().contains("no messages array"));
    }
}
