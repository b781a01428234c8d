//! Noughts Server - CLI entry point.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use noughts_server::{GameServer, ServerConfig};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Command::Serve { host, port, config } => run_server(config, host, port).await,
        Command::CheckConfig { config } => check_config(config),
    }
}

/// Run the match server until Ctrl-C.
#[instrument]
async fn run_server(
    config_path: Option<std::path::PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let config = ServerConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(host, port);

    info!(addr = %config.socket_addr(), "Starting noughts server");
    GameServer::new(config).run().await
}

/// Print the effective configuration as TOML.
fn check_config(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let config =
        ServerConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
