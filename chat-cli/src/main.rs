//! # lanchat
//!
//! Terminal chat over IP multicast. No server: every participant on the
//! segment joins the same group and keeps its own copy of the member list.
//!
//! ## Commands
//!
//! - `init`: Store your display name
//! - `chat`: Join the group and chat interactively
//! - `status`: Show profile and network settings
//! - `config`: Print the effective configuration as TOML
//!
//! ## Example
//!
//! ```bash
//! # Pick a name once
//! lanchat init --name alice
//!
//! # Join the default group 239.0.1.2:20480
//! lanchat chat
//!
//! # Or a different one, with a different name
//! lanchat chat --name bob --group 239.1.2.3 --port 30000
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{chat, init, show_config, status};

/// Terminal chat over IP multicast.
#[derive(Parser, Debug)]
#[command(name = "lanchat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the profile and config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Network configuration file (TOML); defaults to <data-dir>/lanchat.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store your display name
    Init {
        /// Display name shown to other members
        #[arg(long, short)]
        name: String,
    },

    /// Join the group and chat interactively
    Chat {
        /// Display name (overrides the stored profile)
        #[arg(long, short)]
        name: Option<String>,

        /// Multicast group address
        #[arg(long, short)]
        group: Option<Ipv4Addr>,

        /// Group port
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Show profile and network settings
    Status,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let mut session_config = config::load_session_config(&data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Init { name } => {
            init::run(&data_dir, &name).await?;
        }
        Commands::Chat { name, group, port } => {
            if let Some(group) = group {
                session_config.group = group;
            }
            if let Some(port) = port {
                session_config.port = port;
            }
            session_config
                .validate()
                .context("Invalid network settings")?;
            chat::run(&data_dir, name.as_deref(), &session_config).await?;
        }
        Commands::Status => {
            status::run(&data_dir, &session_config).await?;
        }
        Commands::Config => {
            show_config::run(&session_config)?;
        }
    }

    Ok(())
}

/// Install the log subscriber. Logs go to stderr so chat output stays clean.
///
/// `RUST_LOG` takes precedence over `-v`.
fn setup_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for lanchat.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "lanchat")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_flags_parse() {
        let cli = Cli::parse_from([
            "lanchat", "-vv", "chat", "--name", "bob", "--group", "239.1.2.3", "--port", "30000",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Chat { name, group, port } => {
                assert_eq!(name.as_deref(), Some("bob"));
                assert_eq!(group, Some(Ipv4Addr::new(239, 1, 2, 3)));
                assert_eq!(port, Some(30000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["lanchat", "status", "--data-dir", "/tmp/x", "--config", "c.toml"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn bad_group_is_rejected() {
        let result = Cli::try_parse_from(["lanchat", "chat", "--group", "not-an-ip"]);
        assert!(result.is_err());
    }
}
