//! Provider trait — the abstraction over completion backends.
//!
//! A Provider knows how to send an assembled [`Context`] to a language model
//! and get text back, either as a complete string or as a stream of chunks.
//!
//! Implementations: Ollama (native API), scripted mock for tests.

use crate::context::Context;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta.
    #[serde(default)]
    pub content: String,

    /// Whether this is the final chunk.
    #[serde(default)]
    pub done: bool,
}

/// The core Provider trait.
///
/// Every completion backend implements this trait. The session pipeline and
/// the analysis orchestrators call `generate()` without knowing which backend
/// is being used — pure polymorphism.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send the context and wait for the complete response text.
    async fn generate(&self, context: &Context) -> std::result::Result<String, ProviderError>;

    /// Send the context and get a stream of response chunks.
    ///
    /// Default implementation calls `generate()` and wraps the result as a
    /// single terminal chunk.
    async fn generate_stream(
        &self,
        context: &Context,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let text = self.generate(context).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                content: text,
                done: true,
            }))
            .await;
        Ok(rx)
    }

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
