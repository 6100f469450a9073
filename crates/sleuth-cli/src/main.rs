//! Sleuth CLI - case knowledge-graph explorer
//!
//! Loads one case from the notation service (or an exported snapshot) and
//! exposes traversal, inference and synchronization from the terminal.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::Cli;

/// Initialize tracing on stderr so stdout only carries command output.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "sleuth=debug,sleuth_core=debug,sleuth_sync=debug,sleuth_graph=debug"
    } else {
        "sleuth=info,sleuth_sync=info,sleuth_graph=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.execute().await
}
