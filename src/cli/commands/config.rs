//! Config command.

use crate::config::Settings;

/// Run config command - display current configuration.
pub fn run(config: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", config.to_redacted_toml()?);
    Ok(())
}
