//! Text generation providers.
//!
//! The pipeline hands a finished prompt to a [`Generator`] and gets an answer
//! back. Providers differ in request shape, token limits and auth, all of
//! which stay inside their implementation.

pub mod gemini;
pub mod openai;

use async_trait::async_trait;

use crate::config::{GeneratorConfig, GeneratorProvider};
use crate::error::GenerateError;

pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;

/// Result type for generation.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Turns a prompt into answer text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> GenerateResult<String>;
}

/// Build the provider selected in configuration.
///
/// The API key must already be resolved.
pub fn from_config(config: &GeneratorConfig) -> GenerateResult<Box<dyn Generator>> {
    let generator: Box<dyn Generator> = match config.provider {
        GeneratorProvider::Gemini => Box::new(GeminiGenerator::from_config(config)?),
        GeneratorProvider::OpenAi => Box::new(OpenAiGenerator::from_config(config)?),
    };
    tracing::debug!(
        target: "generator",
        "using {} generator with model {}",
        generator.name(),
        config.model
    );
    Ok(generator)
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Turn a non-success response into [`GenerateError::Remote`].
async fn check_status(
    provider: &'static str,
    response: reqwest::Response,
) -> GenerateResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenerateError::Remote {
        provider,
        status: status.as_u16(),
        body,
    })
}
