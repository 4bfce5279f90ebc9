//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod resolve;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "getlink")]
#[command(about = "Resolve gated file-host landing pages into direct download links")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ./getlink.toml when present)
    #[arg(long, global = true, env = "GETLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind: PORT, HOST or HOST:PORT (default 0.0.0.0:$PORT)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Resolve one landing page and print the result as JSON
    Resolve {
        /// Landing page URL
        url: String,

        /// Use the impersonated strategy only
        #[arg(long)]
        no_browser: bool,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(&config, bind.as_deref()).await,
        Commands::Resolve { url, no_browser } => {
            resolve::cmd_resolve(config, &url, no_browser).await
        }
    }
}
