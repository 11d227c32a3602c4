//! Embedding generation and dimension normalization.
//!
//! Models produce vectors of their natural dimension. The vector index
//! has a fixed dimension, so every vector passes through [`normalize`]
//! before it is stored or queried.
//!
//! Normalization is a lossy, order-preserving fixed policy: shorter vectors
//! are right-padded with zeros and longer vectors are truncated. It is not a
//! learned re-projection. When the model's natural dimension differs from the
//! index dimension, retrieval quality degrades silently; prefer a model whose
//! dimension matches the index.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;

/// Texts sent to the model per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Source of embedding vectors.
pub trait Embedder: Send + Sync {
    /// Short identifier for logging (e.g. the model name).
    fn name(&self) -> &str;

    /// Natural dimension of vectors produced by this model.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Force `vector` to exactly `target_dim` entries.
///
/// Pads with `0.0` on the right or truncates to the first `target_dim`
/// entries. Equal lengths pass through unchanged.
pub fn normalize(mut vector: Vec<f32>, target_dim: usize) -> Vec<f32> {
    vector.resize(target_dim, 0.0);
    vector
}

/// Embeds chunks and questions through one normalization path.
pub struct VectorEncoder {
    embedder: Box<dyn Embedder>,
    target_dim: usize,
}

impl std::fmt::Debug for VectorEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorEncoder")
            .field("embedder", &self.embedder.name())
            .field("natural_dim", &self.embedder.dimension())
            .field("target_dim", &self.target_dim)
            .finish()
    }
}

impl VectorEncoder {
    pub fn new(embedder: Box<dyn Embedder>, target_dim: usize) -> Self {
        let natural = embedder.dimension();
        if natural != target_dim {
            tracing::warn!(
                target: "embedding",
                "model {} produces {natural}-d vectors, index expects {target_dim}-d; vectors will be {}",
                embedder.name(),
                if natural < target_dim { "zero-padded" } else { "truncated" }
            );
        }
        Self {
            embedder,
            target_dim,
        }
    }

    /// Dimension of every vector this encoder returns.
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    /// Embed many texts, normalizing each vector to the index dimension.
    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }

        Ok(vectors
            .into_iter()
            .map(|v| normalize(v, self.target_dim))
            .collect())
    }

    /// Embed a single text (a question) through the batch path.
    pub fn encode_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Generation("No embedding generated".to_string()))
    }
}

/// Local sentence-embedding model backed by fastembed.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedder {
    /// Load the model named in configuration.
    ///
    /// Downloads the model into the cache directory on first use.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let model = parse_model(&config.model)?;
        let cache_dir = config.cache_dir.clone().unwrap_or_else(default_cache_dir);

        tracing::info!(
            target: "embedding",
            "loading embedding model {} (cache: {})",
            config.model,
            cache_dir.display()
        );

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(config.show_download_progress),
        )
        .map_err(|e| EmbedError::ModelInit(e.to_string()))?;

        // Probe once to learn the natural dimension
        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbedError::ModelInit(e.to_string()))?;
        let dimension = probe
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| EmbedError::ModelInit("model returned no probe vector".to_string()))?;

        tracing::info!(
            target: "embedding",
            "embedding model ready: {} ({dimension} dimensions)",
            config.model
        );

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: config.model.clone(),
            dimension,
            batch_size: config.batch_size.max(1),
        })
    }
}

impl Embedder for FastEmbedder {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut model = self.model.lock().map_err(|_| EmbedError::LockPoisoned)?;
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbedError::Generation(e.to_string()))
    }
}

/// Resolve a configured model name to a fastembed model.
pub fn parse_model(name: &str) -> Result<EmbeddingModel, EmbedError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        other => Err(EmbedError::UnknownModel(other.to_string())),
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("docrag").join("models"))
        .unwrap_or_else(|| PathBuf::from(".docrag/models"))
}
