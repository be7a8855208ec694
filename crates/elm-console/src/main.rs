//! ELM327 Console - Main Entry Point

use clap::Parser;
use elm_console::{cli::Cli, init_logging, run};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("=== ELM327 Console v{} ===", env!("CARGO_PKG_VERSION"));
    run(cli).await
}
