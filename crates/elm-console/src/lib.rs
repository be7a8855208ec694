//! ELM327 Console
//!
//! Opens a serial link to an adapter, runs its init sequence, sends the
//! commands given on the command line and prints each reply.

pub mod cli;
pub mod registry;
pub mod settings;

use anyhow::Context;
use cli::Cli;
use elm_protocol::{ChannelTransport, ElmSession, Reply, SerialLink, Transport};
use registry::{DeviceRegistry, LastDevice};
use std::io::Write;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
///
/// Logs go to stderr so replies on stdout stay machine-readable.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// One output line per reply: identifier, tab, body
pub fn format_reply(reply: &Reply) -> String {
    format!("{}\t{}", reply.id, reply.body)
}

/// Run the console
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        settings::load(cli.config.as_deref()).context("Failed to load link settings")?;

    let registry = DeviceRegistry::new(
        cli.registry
            .clone()
            .unwrap_or_else(DeviceRegistry::default_path),
    );
    let remembered = registry.last().unwrap_or_else(|e| {
        warn!("Ignoring {}: {}", registry.path().display(), e);
        None
    });
    settings::apply_overrides(&mut config, &cli, remembered);

    let mut session: ElmSession<ChannelTransport> = ElmSession::new(&config);
    session.begin_connect();
    let (link, transport) = match SerialLink::open(&config) {
        Ok(opened) => opened,
        Err(e) => {
            session.connection_failed(&e);
            if session.retry() {
                info!("Adapter unreachable; reconnect once it is powered and paired");
            }
            return Err(e).with_context(|| format!("Failed to open {}", config.device));
        }
    };

    let device = LastDevice {
        name: config
            .device_name
            .clone()
            .unwrap_or_else(|| config.device.clone()),
        address: config.device.clone(),
    };
    if let Err(e) = registry.remember(&device) {
        warn!("Could not remember adapter: {}", e);
    }

    let sink = session.attach(transport);
    let tasks = link.spawn(sink);

    let skip_init = cli.skip_init;
    let commands = cli.commands;
    // Reply waits block, so the command loop runs off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        let result = drive(&mut session, skip_init, &commands, &mut std::io::stdout());
        session.disconnect();
        result
    })
    .await
    .context("Command loop panicked")?;

    if tasks.is_closed() {
        warn!("Adapter link dropped during the session");
    }
    tasks.shutdown();
    outcome
}

/// Initialize the adapter unless skipped, then send each command and print its reply
pub fn drive<T, W>(
    session: &mut ElmSession<T>,
    skip_init: bool,
    commands: &[String],
    out: &mut W,
) -> anyhow::Result<()>
where
    T: Transport,
    W: Write,
{
    if !skip_init {
        for reply in session.initialize().context("Adapter init failed")? {
            debug!("Init reply {}", format_reply(&reply));
        }
    }

    for command in commands {
        let reply = session
            .query(command)
            .with_context(|| format!("Command {command} failed"))?;
        writeln!(out, "{}", format_reply(&reply))?;
    }
    Ok(())
}
