//! Retrieval-augmented store and query operations.
//!
//! [`RagContext`] is built once at startup and owns every loaded model and
//! client. Command handlers borrow it; nothing else holds process state.

use std::sync::Arc;

use crate::chunker::WordChunker;
use crate::config::{QueryConfig, Settings};
use crate::context::ConversationContext;
use crate::embedding::{Embedder, FastEmbedder, VectorEncoder};
use crate::error::{RagError, RagResult};
use crate::generator::{self, Generator};
use crate::index::{self, ChunkMetadata, IndexEntry, VectorStore};
use crate::prompt::PromptBuilder;
use crate::protocol::{
    ClearAllRequest, ClearResponse, Command, DeleteRequest, DeleteResponse, QueryRequest,
    QueryResponse, ResponseBody, SourceMetadata, StoreRequest, StoreResponse,
};

/// Loaded collaborators shared by every command.
pub struct RagContext {
    chunker: WordChunker,
    encoder: VectorEncoder,
    store: Arc<dyn VectorStore>,
    generator: Box<dyn Generator>,
    conversation: ConversationContext,
    prompt: PromptBuilder,
    query: QueryConfig,
    require_clear_confirmation: bool,
}

impl std::fmt::Debug for RagContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagContext")
            .field("chunker", &self.chunker)
            .field("encoder", &self.encoder)
            .field("store", &self.store.backend())
            .field("generator", &self.generator.name())
            .finish()
    }
}

impl RagContext {
    /// Assemble a context from already-built collaborators.
    ///
    /// Vectors are normalized to the store's dimension.
    pub fn new(
        settings: &Settings,
        embedder: Box<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Box<dyn Generator>,
    ) -> RagResult<Self> {
        let chunker = WordChunker::new(settings.chunking.chunk_size, settings.chunking.overlap)?;
        let encoder = VectorEncoder::new(embedder, store.dimension());

        Ok(Self {
            chunker,
            encoder,
            store,
            generator,
            conversation: ConversationContext::new(
                settings.query.history_turns,
                settings.query.history_chars_per_turn,
            ),
            prompt: PromptBuilder::new(),
            query: settings.query.clone(),
            require_clear_confirmation: settings.daemon.require_clear_confirmation,
        })
    }

    /// Load the embedding model and open the configured store and generator.
    ///
    /// Credentials must already be resolved.
    pub fn from_settings(settings: &Settings) -> RagResult<Self> {
        let embedder = FastEmbedder::from_config(&settings.embedding)?;
        let store = index::open_store(&settings.index)?;
        let generator = generator::from_config(&settings.generator)?;
        Self::new(settings, Box::new(embedder), store, generator)
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Run one validated command.
    pub async fn handle(&self, command: Command) -> RagResult<ResponseBody> {
        Ok(match command {
            Command::Store(request) => self.store_document(&request).await?.into(),
            Command::Query(request) => self.query(&request).await?.into(),
            Command::Delete(request) => self.delete(&request).await?.into(),
            Command::ClearAll(request) => self.clear_all(&request).await?.into(),
        })
    }

    /// Chunk, embed and upsert a document.
    ///
    /// Storing the same text again overwrites the same chunk ids.
    pub async fn store_document(&self, request: &StoreRequest) -> RagResult<StoreResponse> {
        require_document_id(&request.document_id)?;

        let chunks = self
            .chunker
            .chunk_document(&request.document_id, &request.text);
        if chunks.is_empty() {
            return Err(RagError::Validation("document text is empty".to_string()));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.encoder.encode_batch(&texts)?;
        let embeddings_created = vectors.len();

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: chunk.id(),
                vector,
                metadata: ChunkMetadata {
                    document_id: chunk.document_id.clone(),
                    file_path: request.file_path.clone(),
                    chunk_index: chunk.chunk_index,
                    total_chunks: chunk.total_chunks,
                    text: chunk.text.clone(),
                },
            })
            .collect();

        self.store.upsert(&entries).await?;

        tracing::info!(
            target: "pipeline",
            "stored document {} ({} chunks)",
            request.document_id,
            chunks.len()
        );

        Ok(StoreResponse {
            success: true,
            document_id: request.document_id.clone(),
            chunks_stored: chunks.len(),
            embeddings_created,
        })
    }

    /// Retrieve relevant chunks and generate an answer from them.
    ///
    /// Generation is skipped when nothing is retrieved.
    pub async fn query(&self, request: &QueryRequest) -> RagResult<QueryResponse> {
        let top_k = self.resolve_top_k(request.top_k)?;
        let document_id = request.document_id.as_deref().filter(|id| !id.is_empty());

        let vector = self.encoder.encode_one(&request.question)?;
        let matches = self.store.query(&vector, top_k, document_id).await?;

        if matches.is_empty() {
            tracing::debug!(target: "pipeline", "no matches (filter: {document_id:?})");
            return Ok(QueryResponse::no_match());
        }

        let sources: Vec<String> = matches.iter().map(|m| m.metadata.text.clone()).collect();
        let metadata: Vec<SourceMetadata> = matches
            .iter()
            .map(|m| SourceMetadata {
                document_id: m.metadata.document_id.clone(),
                chunk_index: m.metadata.chunk_index,
                score: m.score,
            })
            .collect();

        let history = request.conversation_history.as_deref().unwrap_or_default();
        let conversation = self.conversation.build(history);
        let chunk_texts: Vec<&str> = sources.iter().map(String::as_str).collect();
        let prompt = self.prompt.build(
            &request.question,
            &chunk_texts,
            &conversation,
            history.is_empty(),
        );

        tracing::debug!(
            target: "pipeline",
            "generating answer from {} chunks with {}",
            sources.len(),
            self.generator.name()
        );
        let answer = self.generator.generate(&prompt).await?;

        Ok(QueryResponse {
            success: true,
            answer,
            sources,
            metadata,
        })
    }

    /// Remove every chunk of a document.
    pub async fn delete(&self, request: &DeleteRequest) -> RagResult<DeleteResponse> {
        require_document_id(&request.document_id)?;
        self.store.delete(&request.document_id).await?;

        tracing::info!(target: "pipeline", "deleted document {}", request.document_id);
        Ok(DeleteResponse {
            success: true,
            document_id: request.document_id.clone(),
            message: format!(
                "Document {} deleted from vector index",
                request.document_id
            ),
        })
    }

    /// Remove every entry from the index.
    ///
    /// When confirmation is required, a request without `confirm: true`
    /// fails before anything is deleted.
    pub async fn clear_all(&self, request: &ClearAllRequest) -> RagResult<ClearResponse> {
        if self.require_clear_confirmation && !request.confirm {
            return Err(RagError::Validation(
                "clear_all removes every document; resend with \"confirm\": true".to_string(),
            ));
        }

        self.store.clear_all().await?;

        tracing::warn!(
            target: "pipeline",
            "cleared all documents from the {} index",
            self.store.backend()
        );
        Ok(ClearResponse {
            success: true,
            message: "All documents cleared from vector index".to_string(),
        })
    }

    fn resolve_top_k(&self, requested: Option<usize>) -> RagResult<usize> {
        match requested {
            None => Ok(self.query.default_top_k),
            Some(0) => Err(RagError::Validation(
                "top_k must be at least 1".to_string(),
            )),
            Some(k) if k > self.query.max_top_k => {
                tracing::debug!(
                    target: "pipeline",
                    "top_k {k} clamped to {}",
                    self.query.max_top_k
                );
                Ok(self.query.max_top_k)
            }
            Some(k) => Ok(k),
        }
    }
}

fn require_document_id(document_id: &str) -> RagResult<()> {
    if document_id.trim().is_empty() {
        return Err(RagError::Validation(
            "document_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
