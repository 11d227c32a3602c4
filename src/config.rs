//! Configuration module for the docrag daemon.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCRAG_` and use double
//! underscores to separate nested levels:
//! - `DOCRAG_INDEX__DIMENSION=768` sets `index.dimension`
//! - `DOCRAG_GENERATOR__PROVIDER=openai` sets `generator.provider`
//! - `DOCRAG_QUERY__DEFAULT_TOP_K=5` sets `query.default_top_k`
//!
//! Provider credentials left empty fall back to the conventional variables
//! (`GOOGLE_API_KEY`, `GEMINI_API_KEY`, `OPENAI_API_KEY`, `PINECONE_API_KEY`,
//! `PINECONE_INDEX_HOST`). See [`Settings::resolve_credentials`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::chunker::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, WordChunker};
use crate::embedding::DEFAULT_BATCH_SIZE;
use crate::error::ConfigError;

/// Directory searched for in the current directory and its ancestors.
pub const CONFIG_DIR: &str = ".docrag";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

const ENV_PREFIX: &str = "DOCRAG_";

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Word-window chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Local embedding model
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index backend
    #[serde(default)]
    pub index: IndexConfig,

    /// Text generation provider
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Query defaults and conversation windowing
    #[serde(default)]
    pub query: QueryConfig,

    /// Request loop behavior
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    /// Window length in words
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Words shared by adjacent windows
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// fastembed model name (e.g. "ParaphraseMLMiniLML12V2", "AllMiniLML6V2")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Model download cache; defaults to the user cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Texts per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Tantivy index on local disk
    #[default]
    Local,
    /// Pinecone serverless index over REST
    Pinecone,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,

    /// Directory of the local index
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Length of every stored and queried vector
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Entries per upsert request (Pinecone)
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    #[serde(default)]
    pub pinecone: PineconeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PineconeConfig {
    /// Index data-plane host, e.g. "my-index-abc123.svc.us-east-1.pinecone.io"
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub api_key: String,

    /// Empty means the default namespace
    #[serde(default)]
    pub namespace: String,

    #[serde(default = "default_pinecone_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    #[default]
    Gemini,
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub provider: GeneratorProvider,

    #[serde(default = "default_generator_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    /// Override the provider's API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    /// Matches retrieved when a request has no `top_k`
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper bound applied to requested `top_k`
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Prior turns included in the prompt
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Characters kept from each prior turn
    #[serde(default = "default_history_chars")]
    pub history_chars_per_turn: usize,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct DaemonConfig {
    /// Reject `clear_all` requests that do not carry `"confirm": true`
    #[serde(default)]
    pub require_clear_confirmation: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Level for everything without a module override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `daemon = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}
fn default_embedding_model() -> String {
    "ParaphraseMLMiniLML12V2".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index")
}
fn default_dimension() -> usize {
    384
}
fn default_upsert_batch_size() -> usize {
    100
}
fn default_pinecone_timeout() -> u64 {
    30
}
fn default_generator_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.3
}
fn default_generator_timeout() -> u64 {
    60
}
fn default_top_k() -> usize {
    8
}
fn default_max_top_k() -> usize {
    100
}
fn default_history_turns() -> usize {
    4
}
fn default_history_chars() -> usize {
    150
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: None,
            batch_size: default_batch_size(),
            show_download_progress: false,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            path: default_index_path(),
            dimension: default_dimension(),
            upsert_batch_size: default_upsert_batch_size(),
            pinecone: PineconeConfig::default(),
        }
    }
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: String::new(),
            namespace: String::new(),
            timeout_secs: default_pinecone_timeout(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::default(),
            model: default_generator_model(),
            api_key: String::new(),
            base_url: None,
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            history_turns: default_history_turns(),
            history_chars_per_turn: default_history_chars(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// Uses `.docrag/settings.toml` from the nearest ancestor directory that
    /// has one. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration layering a specific TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay inside field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Find `.docrag/settings.toml`, searching from the current directory up.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Reject combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        WordChunker::new(self.chunking.chunk_size, self.chunking.overlap)
            .map_err(|e| ConfigError::Invalid(format!("chunking.overlap: {e}")))?;
        if self.index.dimension == 0 {
            return Err(ConfigError::Invalid(
                "index.dimension must be greater than zero".to_string(),
            ));
        }
        if self.query.default_top_k == 0 {
            return Err(ConfigError::Invalid(
                "query.default_top_k must be at least 1".to_string(),
            ));
        }
        if self.query.default_top_k > self.query.max_top_k {
            return Err(ConfigError::Invalid(format!(
                "query.default_top_k ({}) exceeds query.max_top_k ({})",
                self.query.default_top_k, self.query.max_top_k
            )));
        }
        Ok(())
    }

    /// Fill empty provider credentials from the conventional environment
    /// variables and fail if the selected providers still lack one.
    pub fn resolve_credentials(&mut self) -> Result<(), ConfigError> {
        self.resolve_credentials_with(|name| std::env::var(name).ok())
    }

    /// [`Self::resolve_credentials`] with an injectable variable lookup.
    pub fn resolve_credentials_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_of = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };

        if self.generator.api_key.trim().is_empty() {
            let names: &[&str] = match self.generator.provider {
                GeneratorProvider::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
                GeneratorProvider::OpenAi => &["OPENAI_API_KEY"],
            };
            match first_of(names) {
                Some(key) => self.generator.api_key = key,
                None => {
                    return Err(ConfigError::MissingCredential(format!(
                        "generator.api_key is not set (or set {})",
                        names.join(" / ")
                    )));
                }
            }
        }

        if self.index.backend == IndexBackend::Pinecone {
            let pinecone = &mut self.index.pinecone;
            if pinecone.api_key.trim().is_empty() {
                pinecone.api_key = first_of(&["PINECONE_API_KEY"]).ok_or_else(|| {
                    ConfigError::MissingCredential(
                        "index.pinecone.api_key is not set (or set PINECONE_API_KEY)".to_string(),
                    )
                })?;
            }
            if pinecone.host.trim().is_empty() {
                pinecone.host = first_of(&["PINECONE_INDEX_HOST"]).ok_or_else(|| {
                    ConfigError::MissingCredential(
                        "index.pinecone.host is not set (or set PINECONE_INDEX_HOST)".to_string(),
                    )
                })?;
            }
        }

        Ok(())
    }

    /// Settings as TOML with credentials masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut copy = self.clone();
        for key in [
            &mut copy.generator.api_key,
            &mut copy.index.pinecone.api_key,
        ] {
            if !key.is_empty() {
                *key = "********".to_string();
            }
        }
        toml::to_string_pretty(&copy).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
