//! Store command - chunk and index one text file.

use std::path::Path;

use anyhow::Context;

use crate::config::Settings;
use crate::protocol::{Response, StoreRequest};

/// Run the store command, printing the store response as JSON.
pub async fn run(settings: &Settings, file: &Path, document_id: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let context = super::load_context(settings).await?;
    let request = StoreRequest {
        file_path: file.display().to_string(),
        text,
        document_id: document_id.to_string(),
    };

    let response = context.store_document(&request).await?;
    println!("{}", Response::new(response, None).to_line());
    Ok(())
}
