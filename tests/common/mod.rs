//! Shared mocks for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docrag::config::Settings;
use docrag::embedding::Embedder;
use docrag::error::{EmbedError, GenerateError};
use docrag::generator::Generator;
use docrag::index::LocalVectorStore;
use docrag::pipeline::RagContext;
use tempfile::TempDir;

pub const MOCK_ANSWER: &str = "The fox jumps over the dog.";

/// Bag-of-words embedder: each word adds weight to a bucket chosen from its
/// bytes, so texts sharing words score higher.
pub struct MockEmbedder {
    pub dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for MockEmbedder {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vec = vec![0.0; self.dimension];
                for word in text.split_whitespace() {
                    let bucket = word
                        .to_lowercase()
                        .bytes()
                        .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                        % self.dimension;
                    vec[bucket] += 1.0;
                }
                vec
            })
            .collect())
    }
}

/// Generator that records every prompt and returns a fixed answer.
#[derive(Clone, Default)]
pub struct MockGenerator {
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(MOCK_ANSWER.to_string())
    }
}

/// Generator that always fails.
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        Err(GenerateError::EmptyResponse { provider: "failing" })
    }
}

/// A pipeline over a fresh local index with mock providers.
pub struct TestPipeline {
    pub context: RagContext,
    pub generator: MockGenerator,
    pub temp_dir: TempDir,
}

pub fn test_pipeline(settings: Settings) -> TestPipeline {
    test_pipeline_with_natural_dim(settings, 16)
}

pub fn test_pipeline_with_natural_dim(settings: Settings, natural_dim: usize) -> TestPipeline {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalVectorStore::open(temp_dir.path(), settings.index.dimension).unwrap();
    let generator = MockGenerator::default();
    let context = RagContext::new(
        &settings,
        Box::new(MockEmbedder::new(natural_dim)),
        Arc::new(store),
        Box::new(generator.clone()),
    )
    .unwrap();

    TestPipeline {
        context,
        generator,
        temp_dir,
    }
}

/// Default settings with a small index dimension.
pub fn small_settings() -> Settings {
    let mut settings = Settings::default();
    settings.index.dimension = 16;
    settings
}
