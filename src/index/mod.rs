//! Vector index abstraction and backends.
//!
//! [`VectorStore`] is the capability the pipeline depends on. Two backends
//! implement it:
//! - [`LocalVectorStore`]: a Tantivy index on local disk
//! - [`PineconeStore`]: a Pinecone index over its REST data plane
//!
//! Every backend enforces the dimension invariant: vectors whose length
//! differs from the configured dimension are rejected before any I/O.

pub mod local;
pub mod pinecone;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{IndexBackend, IndexConfig};
use crate::error::IndexError;

pub use local::LocalVectorStore;
pub use pinecone::PineconeStore;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Metadata stored alongside every chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub chunk_index: usize,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub total_chunks: usize,
    #[serde(default)]
    pub text: String,
}

/// A vector with its identifier and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Chunk id, `{document_id}_chunk_{chunk_index}`
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    /// Higher is more relevant
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Persistent similarity index scoped by document id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs and error messages.
    fn backend(&self) -> &'static str;

    /// Length every vector must have.
    fn dimension(&self) -> usize;

    /// Insert or overwrite entries by id. Returns the number stored.
    async fn upsert(&self, entries: &[IndexEntry]) -> IndexResult<usize>;

    /// Rank entries by similarity to `vector`, optionally restricted to one
    /// document. Returns at most `top_k` matches, best first.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> IndexResult<Vec<QueryMatch>>;

    /// Remove every entry of a document. Succeeds when nothing matches.
    async fn delete(&self, document_id: &str) -> IndexResult<()>;

    /// Remove every entry in the index. Not reversible.
    async fn clear_all(&self) -> IndexResult<()>;

    /// Number of entries, optionally restricted to one document.
    async fn count(&self, document_id: Option<&str>) -> IndexResult<usize>;
}

/// Open the backend selected in configuration.
///
/// Pinecone credentials must already be resolved.
pub fn open_store(config: &IndexConfig) -> IndexResult<Arc<dyn VectorStore>> {
    match config.backend {
        IndexBackend::Local => {
            let store = LocalVectorStore::open(&config.path, config.dimension)?;
            Ok(Arc::new(store))
        }
        IndexBackend::Pinecone => {
            let store = PineconeStore::from_config(config)?;
            Ok(Arc::new(store))
        }
    }
}

/// Fail with [`IndexError::DimensionMismatch`] unless `vector` has `expected` entries.
pub fn check_dimension(vector: &[f32], expected: usize) -> IndexResult<()> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            got: vector.len(),
        });
    }
    Ok(())
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

// Remote stores return numeric metadata as floats.
fn lenient_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || !value.is_finite() {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {value}"
        )));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(&[0.0; 4], 4).is_ok());
        let err = check_dimension(&[0.0; 3], 4).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 4,
                got: 3
            }
        ));
    }

    #[test]
    fn test_metadata_accepts_float_indices() {
        let json = r#"{"document_id":"d","file_path":"a.txt","chunk_index":2.0,"total_chunks":3,"text":"t"}"#;
        let metadata: ChunkMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.chunk_index, 2);
        assert_eq!(metadata.total_chunks, 3);
    }

    #[test]
    fn test_metadata_rejects_negative_index() {
        let json = r#"{"chunk_index":-1}"#;
        assert!(serde_json::from_str::<ChunkMetadata>(json).is_err());
    }
}
