//! netmon-collector: MQTT telemetry collector and dashboard.
//!
//! # Usage
//!
//! ```text
//! netmon-collector --broker 127.0.0.1:1883 --out-dir /var/log/netmon --listen 0.0.0.0:8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use netmon_collector::subscriber::{self, DEFAULT_FILTER, SubscriberOptions};
use netmon_collector::{MetricStore, build_router};

const DEFAULT_LOG_FILTER: &str = "info,netmon=debug";

#[derive(Parser)]
#[command(name = "netmon-collector", about = "netmon telemetry collector", version)]
struct Cli {
    /// MQTT broker address (host:port).
    #[arg(long, env = "MQTT_BROKER", default_value = "127.0.0.1:1883")]
    broker: String,

    /// Topic filter to subscribe to.
    #[arg(long, env = "MQTT_TOPIC", default_value = DEFAULT_FILTER)]
    topic: String,

    /// MQTT client id.
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "netmon-collector")]
    client_id: String,

    /// Directory for metrics.log and latest.json.
    #[arg(long, env = "NETMON_OUT_DIR", default_value = "/var/log/netmon")]
    out_dir: PathBuf,

    /// HTTP listen address.
    #[arg(long, env = "NETMON_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Records kept in memory for /api/history.
    #[arg(long, env = "NETMON_HISTORY", default_value = "1000")]
    history: usize,

    /// Emit logs as JSON lines.
    #[arg(long, env = "NETMON_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let store = MetricStore::open(&cli.out_dir, cli.history)
        .with_context(|| format!("cannot use output directory {}", cli.out_dir.display()))?;
    let store = Arc::new(store);
    info!(out_dir = %cli.out_dir.display(), history = cli.history, "metric store ready");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── MQTT subscriber ────────────────────────────────────────

    let options = SubscriberOptions::new(&cli.broker, &cli.topic, &cli.client_id);
    let subscriber_handle = tokio::spawn(subscriber::run(options, store.clone(), shutdown_rx));

    // ── HTTP server ────────────────────────────────────────────

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("cannot listen on {}", cli.listen))?;
    info!(addr = %cli.listen, "HTTP server starting");

    axum::serve(listener, build_router(store))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = subscriber_handle.await;
    info!("collector stopped");
    Ok(())
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
