//! Configuration loading, validation, and management for Hearth.
//!
//! Loads configuration from `hearth.toml` (path overridable via the
//! `HEARTH_CONFIG` environment variable) with environment variable overrides
//! for the most commonly tuned settings. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `hearth.toml`. Every field has a serde default so an
/// empty (or absent) file yields a fully usable configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion-service settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Context assembly settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Retrieval pipeline settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Code-analysis loop settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Settings for the completion backend (Ollama).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model.
    #[serde(default = "default_model")]
    pub model: String,

    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default max tokens per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Short-term buffer capacity.
    #[serde(default = "default_max_short_term")]
    pub max_short_term: usize,

    /// How many recent messages `context_for_query` includes.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Regenerate the rolling summary every N turns.
    #[serde(default = "default_summary_interval")]
    pub summary_interval: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget for the assembled prompt.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in split units.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Top-K hits per search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Rewrite queries through the model before retrieval.
    #[serde(default = "default_enhance_queries")]
    pub enhance_queries: bool,

    /// Embedding vector dimensionality.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Bounded retry limit for the code-analysis loop.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Wall-clock timeout for one code execution.
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,

    /// Wall-clock timeout for a package installation.
    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    /// Interpreter binary used by the sandbox.
    #[serde(default = "default_python_bin")]
    pub python_bin: String,

    /// How many bytes of the data file to show the model as a sample.
    #[serde(default = "default_sample_bytes")]
    pub sample_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path for the conversation log.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "gemma3:12b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_short_term() -> usize {
    20
}
fn default_recent_window() -> usize {
    5
}
fn default_summary_interval() -> usize {
    2
}
fn default_token_budget() -> usize {
    4000
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    3
}
fn default_enhance_queries() -> bool {
    true
}
fn default_embedding_dim() -> usize {
    384
}
fn default_max_attempts() -> usize {
    5
}
fn default_exec_timeout() -> u64 {
    60
}
fn default_install_timeout() -> u64 {
    120
}
fn default_python_bin() -> String {
    "python3".into()
}
fn default_sample_bytes() -> usize {
    2000
}
fn default_db_path() -> String {
    "conversations.db".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_short_term: default_max_short_term(),
            recent_window: default_recent_window(),
            summary_interval: default_summary_interval(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            enhance_queries: default_enhance_queries(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            exec_timeout_secs: default_exec_timeout(),
            install_timeout_secs: default_install_timeout(),
            python_bin: default_python_bin(),
            sample_bytes: default_sample_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration: `HEARTH_CONFIG` path if set, else `hearth.toml`
    /// in the working directory, else pure defaults. Environment overrides
    /// are applied after the file is read.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HEARTH_CONFIG").unwrap_or_else(|_| "hearth.toml".into());
        let mut config = if Path::new(&path).exists() {
            Self::load_from(&path)?
        } else {
            debug!(path = %path, "No config file found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file path (no env overrides, no validation).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: AppConfig = toml::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply environment variable overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HEARTH_OLLAMA_URL") {
            self.provider.base_url = url;
        }
        if let Ok(model) = std::env::var("HEARTH_MODEL") {
            self.provider.model = model;
        }
        if let Ok(db) = std::env::var("HEARTH_DB_PATH") {
            self.storage.db_path = db;
        }
    }

    /// Validate settings that would otherwise fail far from their cause.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.token_budget == 0 {
            return Err(ConfigError::Invalid("context.token_budget must be > 0".into()));
        }
        if self.retrieval.chunk_size == 0 {
            return Err(ConfigError::Invalid("retrieval.chunk_size must be > 0".into()));
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::Invalid(
                "retrieval.chunk_overlap must be smaller than retrieval.chunk_size".into(),
            ));
        }
        if self.memory.max_short_term == 0 {
            return Err(ConfigError::Invalid("memory.max_short_term must be > 0".into()));
        }
        if self.analysis.max_attempts == 0 {
            return Err(ConfigError::Invalid("analysis.max_attempts must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.max_short_term, 20);
        assert_eq!(config.context.token_budget, 4000);
        assert_eq!(config.analysis.max_attempts, 5);
        assert_eq!(config.provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 200);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config: AppConfig = toml::from_str(
            r#"
            [provider]
            model = "llama3:8b"

            [memory]
            max_short_term = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.model, "llama3:8b");
        assert_eq!(config.memory.max_short_term, 8);
        // Untouched sections keep their defaults
        assert_eq!(config.memory.recent_window, 5);
        assert_eq!(config.context.token_budget, 4000);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[analysis]\nmax_attempts = 3").unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.analysis.max_attempts, 3);
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut config: AppConfig = toml::from_str("[provider]\nmodel = \"from-file\"").unwrap();
        unsafe { std::env::set_var("HEARTH_MODEL", "from-env") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("HEARTH_MODEL") };
        assert_eq!(config.provider.model, "from-env");
    }

    #[test]
    fn zero_budget_rejected() {
        let config: AppConfig = toml::from_str("[context]\ntoken_budget = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let config: AppConfig =
            toml::from_str("[retrieval]\nchunk_size = 100\nchunk_overlap = 100").unwrap();
        assert!(config.validate().is_err());
    }
}
