//! Store, query, delete and clear against a local index with mock providers.

mod common;

use std::sync::Arc;

use common::{
    FailingGenerator, MOCK_ANSWER, MockEmbedder, small_settings, test_pipeline,
    test_pipeline_with_natural_dim,
};
use docrag::context::ConversationTurn;
use docrag::error::{ErrorKind, RagError};
use docrag::index::LocalVectorStore;
use docrag::pipeline::RagContext;
use docrag::prompt::{CONTINUATION_INSTRUCTION, GREETING_INSTRUCTION};
use docrag::protocol::{
    ClearAllRequest, DeleteRequest, NO_MATCH_ANSWER, QueryRequest, StoreRequest,
};

const FOX: &str = "The quick brown fox jumps over the lazy dog";

fn store_request(document_id: &str, text: &str) -> StoreRequest {
    StoreRequest {
        file_path: format!("{document_id}.txt"),
        text: text.to_string(),
        document_id: document_id.to_string(),
    }
}

fn query_request(question: &str, document_id: Option<&str>) -> QueryRequest {
    QueryRequest {
        question: question.to_string(),
        document_id: document_id.map(str::to_string),
        top_k: None,
        conversation_history: None,
    }
}

fn long_text(words: usize) -> String {
    (0..words)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn test_store_short_document_single_chunk() {
    let pipeline = test_pipeline(small_settings());

    let response = pipeline
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.document_id, "doc1");
    assert_eq!(response.chunks_stored, 1);
    assert_eq!(response.embeddings_created, 1);

    let store = pipeline.context.vector_store();
    assert_eq!(store.count(Some("doc1")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_store_twice_overwrites() {
    let pipeline = test_pipeline(small_settings());
    let text = long_text(700);

    let first = pipeline
        .context
        .store_document(&store_request("doc1", &text))
        .await
        .unwrap();
    // Starts at 0, 250, 500
    assert_eq!(first.chunks_stored, 3);

    let store = pipeline.context.vector_store();
    let before = store.count(Some("doc1")).await.unwrap();

    let second = pipeline
        .context
        .store_document(&store_request("doc1", &text))
        .await
        .unwrap();
    assert_eq!(second.chunks_stored, first.chunks_stored);
    assert_eq!(store.count(Some("doc1")).await.unwrap(), before);
    assert_eq!(store.count(None).await.unwrap(), 3);
}

#[tokio::test]
async fn test_query_answers_from_retrieved_chunks() {
    let pipeline = test_pipeline(small_settings());
    pipeline
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();

    let response = pipeline
        .context
        .query(&query_request("What does the fox do?", Some("doc1")))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.answer, MOCK_ANSWER);
    assert_eq!(response.sources, vec![FOX.to_string()]);
    assert_eq!(response.metadata.len(), 1);
    assert_eq!(response.metadata[0].document_id, "doc1");
    assert_eq!(response.metadata[0].chunk_index, 0);

    assert_eq!(pipeline.generator.calls(), 1);
    let prompt = pipeline.generator.last_prompt().unwrap();
    assert!(prompt.contains(FOX));
    assert!(prompt.contains("Question: What does the fox do?"));
    assert!(prompt.contains(GREETING_INSTRUCTION));
}

#[tokio::test]
async fn test_query_with_history_continues_conversation() {
    let pipeline = test_pipeline(small_settings());
    pipeline
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();

    let mut request = query_request("And the dog?", None);
    request.conversation_history = Some(vec![
        ConversationTurn::user("What does the fox do?"),
        ConversationTurn::assistant("It jumps."),
    ]);
    pipeline.context.query(&request).await.unwrap();

    let prompt = pipeline.generator.last_prompt().unwrap();
    assert!(prompt.contains(CONTINUATION_INSTRUCTION));
    assert!(!prompt.contains(GREETING_INSTRUCTION));
    assert!(prompt.contains("User: What does the fox do?\nAssistant: It jumps.\n"));
}

#[tokio::test]
async fn test_query_never_stored_document() {
    let pipeline = test_pipeline(small_settings());
    pipeline
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();

    let response = pipeline
        .context
        .query(&query_request("fox?", Some("never-stored")))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.answer, NO_MATCH_ANSWER);
    assert!(response.sources.is_empty());
    assert_eq!(pipeline.generator.calls(), 0);
}

#[tokio::test]
async fn test_delete_then_query_finds_nothing() {
    let pipeline = test_pipeline(small_settings());
    pipeline
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();
    pipeline
        .context
        .store_document(&store_request("doc2", "A different document about cats"))
        .await
        .unwrap();

    let response = pipeline
        .context
        .delete(&DeleteRequest {
            document_id: "doc1".to_string(),
        })
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.message, "Document doc1 deleted from vector index");

    let response = pipeline
        .context
        .query(&query_request("fox", Some("doc1")))
        .await
        .unwrap();
    assert_eq!(response.answer, NO_MATCH_ANSWER);

    // Other documents are untouched
    let store = pipeline.context.vector_store();
    assert_eq!(store.count(Some("doc2")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_clear_all_then_query_finds_nothing() {
    let pipeline = test_pipeline(small_settings());
    pipeline
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();

    let response = pipeline
        .context
        .clear_all(&ClearAllRequest::default())
        .await
        .unwrap();
    assert!(response.success);

    let response = pipeline
        .context
        .query(&query_request("fox", None))
        .await
        .unwrap();
    assert_eq!(response.answer, NO_MATCH_ANSWER);
    assert!(response.sources.is_empty());
    assert!(response.metadata.is_empty());
}

#[tokio::test]
async fn test_clear_all_confirmation_required() {
    let mut settings = small_settings();
    settings.daemon.require_clear_confirmation = true;
    let pipeline = test_pipeline(settings);
    pipeline
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();

    let err = pipeline
        .context
        .clear_all(&ClearAllRequest { confirm: false })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let store = pipeline.context.vector_store();
    assert_eq!(store.count(None).await.unwrap(), 1);

    pipeline
        .context
        .clear_all(&ClearAllRequest { confirm: true })
        .await
        .unwrap();
    assert_eq!(store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_whitespace_text_rejected() {
    let pipeline = test_pipeline(small_settings());

    let err = pipeline
        .context
        .store_document(&store_request("doc1", "  \n\t "))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert_eq!(err.to_string(), "document text is empty");
    assert_eq!(
        pipeline.context.vector_store().count(None).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_empty_document_id_rejected() {
    let pipeline = test_pipeline(small_settings());
    let err = pipeline
        .context
        .store_document(&store_request("", FOX))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_top_k_validation_and_clamping() {
    let mut settings = small_settings();
    settings.query.max_top_k = 2;
    settings.query.default_top_k = 2;
    let pipeline = test_pipeline(settings);

    // 5 words, size 1, no overlap: five chunks
    let mut chunk_settings = small_settings();
    chunk_settings.chunking.chunk_size = 1;
    chunk_settings.chunking.overlap = 0;
    let store = pipeline.context.vector_store().clone();
    let chunking_context = RagContext::new(
        &chunk_settings,
        Box::new(MockEmbedder::new(16)),
        store,
        Box::new(pipeline.generator.clone()),
    )
    .unwrap();
    let stored = chunking_context
        .store_document(&store_request("doc1", "alpha bravo charlie delta echo"))
        .await
        .unwrap();
    assert_eq!(stored.chunks_stored, 5);

    let mut request = query_request("alpha", None);
    request.top_k = Some(0);
    let err = pipeline.context.query(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    request.top_k = Some(50);
    let response = pipeline.context.query(&request).await.unwrap();
    assert_eq!(response.sources.len(), 2);
}

#[tokio::test]
async fn test_natural_dimension_is_normalized() {
    // Model emits 5-d vectors into a 16-d index
    let narrow = test_pipeline_with_natural_dim(small_settings(), 5);
    narrow
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();
    let response = narrow
        .context
        .query(&query_request("fox", Some("doc1")))
        .await
        .unwrap();
    assert_eq!(response.sources.len(), 1);

    // Model emits 40-d vectors into a 16-d index
    let wide = test_pipeline_with_natural_dim(small_settings(), 40);
    let stored = wide
        .context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();
    assert_eq!(stored.embeddings_created, 1);
}

#[tokio::test]
async fn test_generator_failure_is_provider_error() {
    let settings = small_settings();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let store = LocalVectorStore::open(temp_dir.path(), settings.index.dimension).unwrap();
    let context = RagContext::new(
        &settings,
        Box::new(MockEmbedder::new(16)),
        Arc::new(store),
        Box::new(FailingGenerator),
    )
    .unwrap();

    context
        .store_document(&store_request("doc1", FOX))
        .await
        .unwrap();
    let err = context
        .query(&query_request("fox", None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
}

#[tokio::test]
async fn test_invalid_chunking_rejected_at_construction() {
    let mut settings = small_settings();
    settings.chunking.chunk_size = 50;
    settings.chunking.overlap = 50;

    let temp_dir = tempfile::TempDir::new().unwrap();
    let store = LocalVectorStore::open(temp_dir.path(), 16).unwrap();
    let result = RagContext::new(
        &settings,
        Box::new(MockEmbedder::new(16)),
        Arc::new(store),
        Box::new(FailingGenerator),
    );
    assert!(matches!(result, Err(RagError::Chunk(_))));
}
