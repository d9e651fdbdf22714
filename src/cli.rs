//! Command-line interface for strictly_chess.

use clap::{Parser, Subcommand};

/// Strictly Chess - two-seat chess sessions over WebSockets
#[derive(Parser, Debug)]
#[command(name = "strictly_chess")]
#[command(about = "Two-seat chess session server with role-gated move relay", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the session server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Port to bind to
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Tell senders when their move is dropped
        #[arg(long)]
        notify_rejections: bool,
    },

    /// Watch (and play) from the terminal
    Watch {
        /// Socket URL
        #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
        url: String,
    },
}
