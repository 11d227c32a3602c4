//! Binary entry point for docrag.

use clap::Parser;

use docrag::cli::commands;
use docrag::cli::{Cli, Commands};
use docrag::config::Settings;
use docrag::error::ConfigError;

fn load_settings(cli: &Cli) -> Result<Settings, ConfigError> {
    match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let command = cli.command();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            docrag::logging::init();
            if command == Commands::Serve {
                commands::serve::report_startup_failure(e.to_string()).await;
            }
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    docrag::logging::init_with_config(&settings.logging);
    tracing::debug!(
        target: "config",
        "loaded settings (file: {})",
        cli.config
            .as_deref()
            .map_or_else(|| "workspace default".to_string(), |p| p.display().to_string())
    );

    let result = match command {
        Commands::Serve => commands::serve::run(&settings).await,
        Commands::Store { file, document_id } => {
            commands::store::run(&settings, &file, &document_id).await
        }
        Commands::Query {
            question,
            document_id,
            top_k,
        } => commands::query::run(&settings, &question, document_id, top_k).await,
        Commands::Config => commands::config::run(&settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
