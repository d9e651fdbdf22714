//! Strictly Chess - Unified CLI
//!
//! Session server and terminal client.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use strictly_chess::ServerConfig;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,strictly_chess=debug";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            host,
            notify_rejections,
        } => {
            let config = load_server_config(config, host, port, notify_rejections)?;
            initialize_tracing(config.log_filter().as_deref());
            info!(addr = %config.bind_addr(), "Starting Strictly Chess server");
            strictly_chess::run_http_server(config).await
        }
        Command::Watch { url } => {
            initialize_tracing(Some("warn"));
            strictly_chess::run_watch(&url).await
        }
    }
}

fn initialize_tracing(fallback: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or(DEFAULT_FILTER))),
        )
        .init();
}

#[instrument]
fn load_server_config(
    path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    notify_rejections: bool,
) -> Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::from_file(&path)?,
        None => ServerConfig::default(),
    };

    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if notify_rejections {
        config = config.with_notify_rejections(true);
    }

    config.validate()?;
    Ok(config)
}
