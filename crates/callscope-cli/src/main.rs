//! `callscope` command line client
//!
//! Browse organizations, calls, statistics and rosters of a hosted call-center
//! analytics backend, or of the built-in demo backend with `--offline`.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use anyhow::Context;
use callscope_cli::{App, Cli};
use callscope_core::{Config, init_logging};
use clap::Parser;
use tracing::{error, info};

/// Main entry point for the command line client
///
/// # Errors
///
/// Returns error if configuration cannot be loaded or the command fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (for development convenience)
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Note: .env file not loaded: {e}");
    }

    let cli = Cli::parse();

    let config = Config::load_from(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        offline = cli.offline,
        "callscope starting"
    );

    let mut app = App::from_cli(&cli, config)?;
    match app.run(cli.command).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "command failed");
            Err(e)
        }
    }
}
