//! Tantivy schema for the local vector index.
//!
//! Each Tantivy document is one chunk: its identifiers for exact-match
//! filtering plus the stored vector and metadata.

use tantivy::schema::{FAST, Field, STORED, STRING, Schema, SchemaBuilder};

/// Schema fields for chunk vector storage.
#[derive(Debug)]
pub struct VectorSchema {
    /// Chunk identifier, exact-match for upsert.
    pub chunk_id: Field,

    /// Owning document, exact-match for filtered query and delete.
    pub document_id: Field,

    /// Provenance label supplied with the document.
    pub file_path: Field,

    /// Position of the chunk within its document.
    pub chunk_index: Field,

    /// Chunks produced by the document.
    pub total_chunks: Field,

    /// Chunk text returned as a query source.
    pub text: Field,

    /// Embedding as a JSON array of floats.
    pub vector: Field,

    /// Timestamp when stored (UTC seconds).
    pub indexed_at: Field,
}

impl VectorSchema {
    /// Build the schema for chunk vector storage.
    pub fn build() -> (Schema, Self) {
        let mut builder = SchemaBuilder::default();

        // Exact-match identifiers
        let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
        let document_id = builder.add_text_field("document_id", STRING | STORED | FAST);

        // Stored only, never searched
        let file_path = builder.add_text_field("file_path", STORED);
        let chunk_index = builder.add_u64_field("chunk_index", STORED);
        let total_chunks = builder.add_u64_field("total_chunks", STORED);
        let text = builder.add_text_field("text", STORED);
        let vector = builder.add_text_field("vector", STORED);

        let indexed_at = builder.add_u64_field("indexed_at", STORED | FAST);

        let schema = builder.build();

        let vector_schema = Self {
            chunk_id,
            document_id,
            file_path,
            chunk_index,
            total_chunks,
            text,
            vector,
            indexed_at,
        };

        (schema, vector_schema)
    }
}
