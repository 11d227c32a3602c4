//! Query command - answer one question from the command line.

use crate::config::Settings;
use crate::protocol::{QueryRequest, QueryResponse};

/// Run the query command.
pub async fn run(
    settings: &Settings,
    question: &[String],
    document_id: Option<String>,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let context = super::load_context(settings).await?;
    let request = QueryRequest {
        question: question.join(" "),
        document_id,
        top_k,
        conversation_history: None,
    };

    let response = context.query(&request).await?;
    print!("{}", render_answer(&response));
    Ok(())
}

/// Answer text followed by one line per source with its relevance.
pub fn render_answer(response: &QueryResponse) -> String {
    let mut out = format!("{}\n", response.answer.trim_end());

    if !response.metadata.is_empty() {
        out.push_str("\nSources:\n");
        for source in &response.metadata {
            out.push_str(&format!(
                "  {} (chunk {}): {:.1}% relevant\n",
                source.document_id,
                source.chunk_index,
                source.score * 100.0
            ));
        }
    }
    out
}
