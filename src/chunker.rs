//! Word-window chunking.
//!
//! Documents are split on whitespace and cut into fixed-size windows of words.
//! Consecutive windows start `chunk_size - overlap` words apart, so each window
//! repeats the last `overlap` words of the previous one.

use serde::{Deserialize, Serialize};

use crate::error::ChunkError;

/// Default window length in words.
pub const DEFAULT_CHUNK_SIZE: usize = 300;

/// Default number of words shared by adjacent windows.
pub const DEFAULT_OVERLAP: usize = 50;

/// A chunk of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document.
    pub document_id: String,
    /// Position within the document (0-based).
    pub chunk_index: usize,
    /// Number of chunks the document produced.
    pub total_chunks: usize,
    /// Words of this window joined by single spaces.
    pub text: String,
}

impl Chunk {
    /// Stable identifier `{document_id}_chunk_{chunk_index}`.
    pub fn id(&self) -> String {
        chunk_id(&self.document_id, self.chunk_index)
    }
}

/// Build the index identifier for a chunk.
pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}

/// Split `text` into overlapping word windows.
///
/// Fails with [`ChunkError::InvalidParameter`] when `chunk_size` is zero or
/// `overlap >= chunk_size`, since the stride would not advance.
pub fn chunk_words(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkError> {
    let stride = stride(chunk_size, overlap)?;
    Ok(windows(text, chunk_size, stride))
}

/// Distance between window starts; the single guard on chunking parameters.
fn stride(chunk_size: usize, overlap: usize) -> Result<usize, ChunkError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(ChunkError::InvalidParameter {
            chunk_size,
            overlap,
        });
    }
    Ok(chunk_size - overlap)
}

/// `stride` must be non-zero.
fn windows(text: &str, chunk_size: usize, stride: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    (0..words.len())
        .step_by(stride)
        .map(|start| {
            let end = (start + chunk_size).min(words.len());
            words[start..end].join(" ")
        })
        .filter(|window| !window.trim().is_empty())
        .collect()
}

/// Chunker with validated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordChunker {
    chunk_size: usize,
    overlap: usize,
    stride: usize,
}

impl Default for WordChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            stride: DEFAULT_CHUNK_SIZE - DEFAULT_OVERLAP,
        }
    }
}

impl WordChunker {
    /// Create a chunker, rejecting parameters with a non-positive stride.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        Ok(Self {
            chunk_size,
            overlap,
            stride: stride(chunk_size, overlap)?,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into window strings.
    pub fn split(&self, text: &str) -> Vec<String> {
        windows(text, self.chunk_size, self.stride)
    }

    /// Split a document into indexed chunks carrying their position.
    pub fn chunk_document(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let texts = self.split(text);
        let total_chunks = texts.len();

        texts
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                document_id: document_id.to_string(),
                chunk_index,
                total_chunks,
                text,
            })
            .collect()
    }
}
