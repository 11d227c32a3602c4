//! Retrieval-augmented question answering over a persistent vector index.
//!
//! Documents are split into overlapping word windows, embedded, and stored in
//! a vector index. Questions are embedded the same way, matched against the
//! index, and answered by a text generator conditioned on the retrieved
//! chunks and recent conversation.
//!
//! The [`daemon`] serves this over line-delimited JSON on stdin/stdout.

pub mod chunker;
pub mod cli;
pub mod config;
pub mod context;
pub mod daemon;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod protocol;

pub use chunker::{Chunk, WordChunker, chunk_words};
pub use config::Settings;
pub use context::{ConversationContext, ConversationTurn, TurnRole};
pub use daemon::{Daemon, DaemonState, StopReason};
pub use embedding::{Embedder, FastEmbedder, VectorEncoder, normalize};
pub use error::{ErrorKind, RagError, RagResult};
pub use generator::Generator;
pub use index::{IndexEntry, LocalVectorStore, PineconeStore, QueryMatch, VectorStore};
pub use pipeline::RagContext;
pub use prompt::PromptBuilder;
