//! Shared application wiring for CLI commands.
//!
//! One explicitly owned context object instead of process globals: the
//! document store, the vector index, the session table, and the turn log
//! all hang off `App` and are passed to whatever needs them.

use anyhow::Context as _;
use hearth_config::AppConfig;
use hearth_core::provider::Provider;
use hearth_memory::log::TurnLog;
use hearth_providers::OllamaProvider;
use hearth_retrieval::document::load_text;
use hearth_retrieval::embed::{Embedder, HashEmbedder};
use hearth_retrieval::index::{InMemoryIndex, VectorIndex};
use hearth_retrieval::splitter::CharacterSplitter;
use hearth_retrieval::store::DocumentStore;
use hearth_session::manager::SessionManager;
use hearth_session::pipeline::TurnEngine;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything a command needs, wired once.
pub struct App {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub store: Arc<DocumentStore>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub log: Arc<TurnLog>,
    pub sessions: Arc<SessionManager>,
}

impl App {
    /// Load configuration and construct the shared context.
    pub async fn bootstrap() -> anyhow::Result<Self> {
        let config = AppConfig::load().context("loading configuration")?;

        let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::new(
            &config.provider.base_url,
            &config.provider.model,
        ));
        let log = Arc::new(
            TurnLog::open(&config.storage.db_path)
                .await
                .context("opening conversation log")?,
        );

        Ok(Self {
            provider,
            store: Arc::new(DocumentStore::new()),
            index: Arc::new(InMemoryIndex::new()),
            embedder: Arc::new(HashEmbedder::new(config.retrieval.embedding_dim)),
            log,
            sessions: Arc::new(SessionManager::new(config.memory.clone())),
            config,
        })
    }

    /// Build the per-turn engine over this context.
    pub fn engine(&self) -> TurnEngine {
        TurnEngine::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.store),
            Arc::clone(&self.index),
            Arc::clone(&self.embedder),
            Arc::clone(&self.log),
            Arc::clone(&self.sessions),
            self.config.clone(),
        )
    }

    /// Load, split, embed, and index the given text files.
    pub async fn ingest(&self, paths: &[impl AsRef<Path>]) -> anyhow::Result<usize> {
        let splitter = CharacterSplitter::new(
            self.config.retrieval.chunk_size,
            self.config.retrieval.chunk_overlap,
        );

        let mut total_chunks = 0;
        for path in paths {
            let path = path.as_ref();
            let documents = load_text(path)
                .await
                .with_context(|| format!("loading {}", path.display()))?;
            let chunks = splitter.split_documents(&documents);
            total_chunks += chunks.len();

            let embeddings = self
                .embedder
                .embed_documents(&chunks)
                .await
                .context("embedding chunks")?;
            self.store.add_documents(chunks).await;
            self.index
                .add(embeddings)
                .await
                .context("indexing embeddings")?;

            info!(path = %path.display(), "Document ingested");
        }

        Ok(total_chunks)
    }
}
