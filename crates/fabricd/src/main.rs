//! Fabric provisioning CLI
//!
//! Main entry point for the fabricd binary.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fabric_device::NetconfTransportFactory;
use fabricd::commands::Runner;
use fabricd::{Cli, FabricConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level, cli.json) {
        eprintln!("fabricd: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!(error = %format!("{:#}", e), "fabricd: Command failed");
            ExitCode::FAILURE
        }
    }
}

/// Initialize structured logging; `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to set logger: {}", e))
}

async fn run(cli: Cli) -> Result<bool> {
    let config = FabricConfig::load_or_default(&cli.config)?;
    config.validate()?;
    info!(
        config = %cli.config.display(),
        devices = config.devices.len(),
        "fabricd: Loaded inventory"
    );

    let factory = Arc::new(NetconfTransportFactory::new(config.netconf_settings()));
    let runner = Runner::new(config, factory, cli.json);
    let cancel = setup_signal_handlers();

    let mut stdout = io::stdout().lock();
    runner.execute(&cli.command, &cancel, &mut stdout).await
}

/// Cancels every in-flight device on SIGINT.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("fabricd: Received SIGINT, cancelling");
            on_signal.cancel();
        }
    });

    cancel
}
