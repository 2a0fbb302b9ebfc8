//! netmond: network health probe daemon.
//!
//! # Usage
//!
//! ```text
//! netmond run --config /etc/netmon/netmon.toml
//! netmond check-config --config ./netmon.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use netmon_core::{NetmonConfig, Target};
use netmon_probe::{Probe, TargetProbe};
use netmond::publisher::{self, PublisherOptions};
use netmond::{ConsolePanel, Monitor, SysfsLink};

const DEFAULT_LOG_FILTER: &str = "info,netmond=debug,netmon=debug";

#[derive(Parser)]
#[command(name = "netmond", about = "Network health probe daemon", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "NETMON_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor until interrupted.
    Run {
        /// Path to netmon.toml. Built-in defaults apply when omitted.
        #[arg(long, short, env = "NETMON_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Validate the configuration and print it with defaults filled in.
    CheckConfig {
        /// Path to netmon.toml.
        #[arg(long, short, env = "NETMON_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run { config } => run(config.as_deref()).await,
        Command::CheckConfig { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NetmonConfig> {
    match path {
        Some(path) => {
            NetmonConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))
        }
        None => {
            info!("no config file given, using defaults");
            Ok(NetmonConfig::default())
        }
    }
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    info!(
        device = %config.device.id,
        interface = %config.link.interface,
        upstream = %config.upstream.address,
        downstream = %config.downstream.address,
        "netmond starting"
    );

    // ── Probes ─────────────────────────────────────────────────

    let upstream = TargetProbe::from_config(&config.upstream);
    let downstream = TargetProbe::from_config(&config.downstream);
    preflight(&upstream, Target::Upstream).await?;
    preflight(&downstream, Target::Downstream).await?;

    // ── Telemetry ──────────────────────────────────────────────

    let (telemetry, publisher_task) = if config.telemetry.enabled {
        let (handle, task) = publisher::spawn(PublisherOptions::from_config(&config));
        (Some(handle), Some(task))
    } else {
        info!("telemetry disabled");
        (None, None)
    };

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // ── Control loop ───────────────────────────────────────────

    let monitor = Monitor::new(&config, SysfsLink::new(&config.link), ConsolePanel::new(), telemetry);
    monitor.run(upstream, downstream, shutdown_rx).await?;

    // The monitor held the last telemetry handle; the publisher drains and exits.
    if let Some(task) = publisher_task {
        let _ = task.await;
    }

    info!("netmond stopped");
    Ok(())
}

/// One probe per target before the loop starts. An unreachable target is
/// fine; a probe that cannot run at all is a startup error.
async fn preflight(probe: &TargetProbe, target: Target) -> anyhow::Result<()> {
    let result = probe
        .probe()
        .await
        .with_context(|| format!("{target} probe cannot run"))?;
    debug!(%target, ok = result.succeeded(), latency_ms = result.latency_ms(), "preflight probe");
    Ok(())
}
