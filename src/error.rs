//! Error types shared across the pipeline.
//!
//! Each subsystem owns a focused error enum. `RagError` wraps them at the
//! command-handling boundary and maps every failure onto an [`ErrorKind`].

use thiserror::Error;

/// Errors from splitting text into chunks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error(
        "invalid chunking parameters: chunk_size ({chunk_size}) must be greater than zero and greater than overlap ({overlap})"
    )]
    InvalidParameter { chunk_size: usize, overlap: usize },
}

/// Errors from embedding generation.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Failed to generate embedding: {0}")]
    Generation(String),

    #[error("Embedding model returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("Unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Errors from the vector index backends.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Directory error: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Corrupt index entry: {0}")]
    Corrupt(String),

    #[error("Operation not supported by the {backend} backend: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Vector store responded with {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Errors from text generation providers.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} responded with {status}: {body}")]
    Remote {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned no text")]
    EmptyResponse { provider: &'static str },
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// Classification of failures reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request line.
    Parse,
    /// Missing field or invalid parameter.
    Validation,
    /// Embedding, index or generation backend failure.
    Provider,
    /// Startup configuration problem.
    Config,
}

/// Top-level error for pipeline operations.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid request: {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RagError {
    /// Map this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::Validation(_) | Self::Chunk(_) => ErrorKind::Validation,
            Self::Index(IndexError::DimensionMismatch { .. }) => ErrorKind::Validation,
            Self::Embed(_) | Self::Index(_) | Self::Generate(_) => ErrorKind::Provider,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result type for pipeline operations.
pub type RagResult<T> = Result<T, RagError>;
