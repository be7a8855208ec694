//! Settings loading
//!
//! Layers, lowest first: built-in defaults, an optional TOML file,
//! `ELM_LINK_*` environment variables, then command-line flags.

use crate::cli::Cli;
use crate::registry::LastDevice;
use config::{Config, ConfigError, Environment, File};
use elm_protocol::LinkConfig;
use std::path::Path;

/// Environment variable prefix
const ENV_PREFIX: &str = "ELM_LINK";

/// Load link settings from an optional file and the environment
pub fn load(path: Option<&Path>) -> Result<LinkConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("init_commands"),
        )
        .build()?
        .try_deserialize()
}

/// Apply command-line flags and the remembered adapter on top of `config`
///
/// The device comes from `--device`, else the remembered adapter, else the
/// settings file.
pub fn apply_overrides(config: &mut LinkConfig, cli: &Cli, remembered: Option<LastDevice>) {
    match (&cli.device, remembered) {
        (Some(device), _) => config.device = device.clone(),
        (None, Some(last)) => {
            config.device = last.address;
            config.device_name = Some(last.name);
        }
        (None, None) => {}
    }
    if let Some(name) = &cli.name {
        config.device_name = Some(name.clone());
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = Some(baud);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.reply_timeout_ms = timeout_ms;
    }
    if cli.no_retry {
        config.retry = false;
    }
}
