//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod config;
pub mod query;
pub mod serve;
pub mod store;

use crate::config::Settings;
use crate::error::{EmbedError, RagResult};
use crate::pipeline::RagContext;

/// Resolve credentials and load every collaborator.
///
/// Model loading blocks, so it runs off the async runtime's worker.
pub async fn load_context(settings: &Settings) -> RagResult<RagContext> {
    let mut settings = settings.clone();
    settings.resolve_credentials()?;

    tokio::task::spawn_blocking(move || RagContext::from_settings(&settings))
        .await
        .map_err(|e| EmbedError::ModelInit(format!("model loading task failed: {e}")))?
}
