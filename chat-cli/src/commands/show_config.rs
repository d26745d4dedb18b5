//! Print the effective network configuration.

use anyhow::{Context, Result};
use chat_client::SessionConfig;

/// Run the config command.
pub fn run(config: &SessionConfig) -> Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

fn render(config: &SessionConfig) -> Result<String> {
    config.to_toml().context("Failed to render configuration")
}
