//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Document question answering daemon
#[derive(Parser, Debug)]
#[command(
    name = "docrag",
    version = env!("CARGO_PKG_VERSION"),
    about = "Retrieval-augmented question answering over stored documents",
    long_about = "Store document text in a vector index and answer questions about it. \
                  Without a subcommand, serves line-delimited JSON requests on stdin.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "DOCRAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve requests over stdin/stdout
    #[command(
        about = "Run the stdio daemon (default)",
        after_help = "Protocol:\n  One JSON request per input line, one JSON response per output line.\n  Commands: store, query, delete, clear_all\n\nExample:\n  echo '{\"command\":\"query\",\"question\":\"Who is the tenant?\"}' | docrag serve"
    )]
    Serve,

    /// Chunk and store a plain-text file
    #[command(about = "Store a text file in the index")]
    Store {
        /// Text file to store
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Identifier for the stored document
        #[arg(short, long)]
        document_id: String,
    },

    /// Ask one question
    #[command(
        about = "Answer a question from stored documents",
        after_help = "Examples:\n  docrag query What is the invoice total?\n  docrag query --document-id lease-2024 When does the lease end?"
    )]
    Query {
        /// Question words
        #[arg(value_name = "QUESTION", required = true, num_args = 1..)]
        question: Vec<String>,

        /// Restrict retrieval to one document
        #[arg(short, long)]
        document_id: Option<String>,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}
