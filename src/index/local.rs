//! Local vector storage in a Tantivy index.
//!
//! Tantivy holds identifiers, metadata and the serialized vector. Filtering
//! by document uses exact-match term queries; similarity is cosine, computed
//! over the filtered candidates.
//!
//! The vector dimension is recorded next to the index when it is created.
//! Reopening with a different dimension fails instead of mixing lengths.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument as Document, Term,
};

use super::schema::VectorSchema;
use super::{
    ChunkMetadata, IndexEntry, IndexResult, QueryMatch, VectorStore, check_dimension,
    cosine_similarity,
};
use crate::error::IndexError;

/// Tantivy writer heap size in bytes.
const WRITER_HEAP_SIZE: usize = 50_000_000;

/// Sidecar file holding [`VectorMeta`].
const VECTOR_META_FILE: &str = "vectors.json";

#[derive(Debug, Serialize, Deserialize)]
struct VectorMeta {
    dimension: usize,
}

/// Record `dimension` for a new index, or check it against the recorded one.
fn sync_dimension(path: &Path, dimension: usize) -> IndexResult<()> {
    let meta_path = path.join(VECTOR_META_FILE);

    if meta_path.exists() {
        let meta: VectorMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)
            .map_err(|e| IndexError::Corrupt(format!("{}: {e}", meta_path.display())))?;
        if meta.dimension != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: meta.dimension,
                got: dimension,
            });
        }
        return Ok(());
    }

    let json = serde_json::to_string(&VectorMeta { dimension })
        .map_err(|e| IndexError::Corrupt(e.to_string()))?;
    std::fs::write(&meta_path, json)?;
    Ok(())
}

pub struct LocalVectorStore {
    /// Index directory
    path: PathBuf,

    index: Index,
    reader: IndexReader,
    schema: VectorSchema,

    /// Lazily created writer
    writer: Mutex<Option<IndexWriter<Document>>>,

    dimension: usize,
}

impl std::fmt::Debug for LocalVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVectorStore")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl LocalVectorStore {
    /// Create or open a local index.
    ///
    /// # Arguments
    /// * `path` - Directory for the Tantivy index
    /// * `dimension` - Length every vector must have
    ///
    /// Fails with [`IndexError::DimensionMismatch`] when the index was
    /// created with another dimension.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        sync_dimension(&path, dimension)?;

        let (tantivy_schema, vector_schema) = VectorSchema::build();

        let existing = path.join("meta.json").exists();
        let index = if existing {
            Index::open_in_dir(&path)?
        } else {
            let dir = MmapDirectory::open(&path)?;
            Index::create(dir, tantivy_schema, IndexSettings::default())?
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        // Pick up segments committed by a previous run
        if existing {
            reader.reload()?;
        }

        tracing::debug!(
            target: "index",
            "opened local index at {} ({dimension} dimensions)",
            path.display()
        );

        Ok(Self {
            path,
            index,
            reader,
            schema: vector_schema,
            writer: Mutex::new(None),
            dimension,
        })
    }

    fn ensure_writer<'a>(
        &self,
        writer_guard: &'a mut Option<IndexWriter<Document>>,
    ) -> IndexResult<&'a mut IndexWriter<Document>> {
        let writer = match writer_guard.take() {
            Some(writer) => writer,
            None => self.index.writer(WRITER_HEAP_SIZE)?,
        };
        Ok(writer_guard.insert(writer))
    }

    /// Run `f` against the writer, then commit and reload the reader.
    ///
    /// On failure every operation queued since the last commit is rolled back.
    fn write<F>(&self, f: F) -> IndexResult<()>
    where
        F: FnOnce(&mut IndexWriter<Document>, &VectorSchema) -> IndexResult<()>,
    {
        {
            let mut writer_guard = self.writer.lock().map_err(|_| IndexError::LockPoisoned)?;
            let writer = self.ensure_writer(&mut writer_guard)?;

            let result = f(&mut *writer, &self.schema).and_then(|()| Ok(writer.commit()?));
            if let Err(e) = result {
                if let Err(rollback) = writer.rollback() {
                    tracing::error!(target: "index", "rollback after failed write: {rollback}");
                }
                return Err(e);
            }
        }

        self.reader.reload()?;
        Ok(())
    }

    fn filter_query(&self, document_id: Option<&str>) -> Box<dyn Query> {
        match document_id {
            Some(id) => {
                let term = Term::from_field_text(self.schema.document_id, id);
                Box::new(TermQuery::new(term, IndexRecordOption::Basic))
            }
            None => Box::new(AllQuery),
        }
    }

    fn build_document(&self, entry: &IndexEntry, indexed_at: u64) -> IndexResult<Document> {
        let vector_json =
            serde_json::to_string(&entry.vector).map_err(|e| IndexError::Corrupt(e.to_string()))?;

        let mut doc = Document::new();
        doc.add_text(self.schema.chunk_id, &entry.id);
        doc.add_text(self.schema.document_id, &entry.metadata.document_id);
        doc.add_text(self.schema.file_path, &entry.metadata.file_path);
        doc.add_u64(self.schema.chunk_index, entry.metadata.chunk_index as u64);
        doc.add_u64(self.schema.total_chunks, entry.metadata.total_chunks as u64);
        doc.add_text(self.schema.text, &entry.metadata.text);
        doc.add_text(self.schema.vector, &vector_json);
        doc.add_u64(self.schema.indexed_at, indexed_at);
        Ok(doc)
    }

    fn read_document(&self, doc: &Document) -> IndexResult<(String, Vec<f32>, ChunkMetadata)> {
        let text_of = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let u64_of = |field| doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0) as usize;

        let id = text_of(self.schema.chunk_id);
        let vector_json = doc
            .get_first(self.schema.vector)
            .and_then(|v| v.as_str())
            .ok_or_else(|| IndexError::Corrupt(format!("chunk {id} has no stored vector")))?;
        let vector: Vec<f32> = serde_json::from_str(vector_json)
            .map_err(|e| IndexError::Corrupt(format!("chunk {id}: {e}")))?;
        check_dimension(&vector, self.dimension)?;

        let metadata = ChunkMetadata {
            document_id: text_of(self.schema.document_id),
            file_path: text_of(self.schema.file_path),
            chunk_index: u64_of(self.schema.chunk_index),
            total_chunks: u64_of(self.schema.total_chunks),
            text: text_of(self.schema.text),
        };

        Ok((id, vector, metadata))
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> IndexResult<usize> {
        for entry in entries {
            check_dimension(&entry.vector, self.dimension)?;
        }
        if entries.is_empty() {
            return Ok(0);
        }

        let indexed_at = chrono::Utc::now().timestamp().max(0) as u64;
        let docs = entries
            .iter()
            .map(|entry| self.build_document(entry, indexed_at))
            .collect::<IndexResult<Vec<_>>>()?;

        self.write(|writer, schema| {
            for (entry, doc) in entries.iter().zip(docs) {
                // Deletes only apply to documents added before them
                writer.delete_term(Term::from_field_text(schema.chunk_id, &entry.id));
                writer.add_document(doc)?;
            }
            Ok(())
        })?;

        tracing::debug!(target: "index", "upserted {} entries", entries.len());
        Ok(entries.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> IndexResult<Vec<QueryMatch>> {
        check_dimension(vector, self.dimension)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let limit = (searcher.num_docs() as usize).max(1);
        let query = self.filter_query(document_id);
        let candidates = searcher.search(query.as_ref(), &TopDocs::with_limit(limit))?;

        let mut matches = Vec::with_capacity(candidates.len());
        for (_score, doc_address) in candidates {
            let doc: Document = searcher.doc(doc_address)?;
            let (id, stored, metadata) = self.read_document(&doc)?;
            matches.push(QueryMatch {
                id,
                score: cosine_similarity(vector, &stored),
                metadata,
            });
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);

        tracing::debug!(
            target: "index",
            "query returned {} matches (filter: {document_id:?})",
            matches.len()
        );
        Ok(matches)
    }

    async fn delete(&self, document_id: &str) -> IndexResult<()> {
        self.write(|writer, schema| {
            writer.delete_term(Term::from_field_text(schema.document_id, document_id));
            Ok(())
        })?;
        tracing::debug!(target: "index", "deleted entries of document {document_id}");
        Ok(())
    }

    async fn clear_all(&self) -> IndexResult<()> {
        self.write(|writer, _schema| {
            writer.delete_all_documents()?;
            Ok(())
        })?;
        tracing::info!(target: "index", "cleared local index at {}", self.path.display());
        Ok(())
    }

    async fn count(&self, document_id: Option<&str>) -> IndexResult<usize> {
        let searcher = self.reader.searcher();
        let query = self.filter_query(document_id);
        Ok(searcher.search(query.as_ref(), &Count)?)
    }
}
