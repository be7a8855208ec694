//! Command line interface for the `elm-console` binary.

use clap::Parser;
use std::path::PathBuf;

/// Command line arguments for the `elm-console` binary.
#[derive(Debug, Parser)]
#[command(
    name = "elm-console",
    version,
    about = "Send commands to an ELM327 adapter and print its replies"
)]
pub struct Cli {
    /// TOML file with link settings.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial device of the adapter; defaults to the last one used.
    #[arg(short, long)]
    pub device: Option<String>,

    /// Name to remember the adapter by.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Serial baud rate.
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Reply timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Do not ask for reconnection after a failure.
    #[arg(long)]
    pub no_retry: bool,

    /// Skip the adapter init sequence.
    #[arg(long)]
    pub skip_init: bool,

    /// File that remembers the last adapter used.
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,

    /// Commands to send, in order.
    pub commands: Vec<String>,
}
