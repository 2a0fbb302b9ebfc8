//! Broker subscription loop.
//!
//! Connects, subscribes to the metrics filter and feeds every PUBLISH
//! into the [`MetricStore`]. Any broker error ends the session; a new
//! one is attempted after `retry_delay`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use netmon_mqtt::{ConnectOptions, MqttClient};

use crate::error::CollectorResult;
use crate::record::format_ts;
use crate::store::MetricStore;

pub const DEFAULT_FILTER: &str = "netmon/+/metrics";

#[derive(Debug, Clone)]
pub struct SubscriberOptions {
    pub broker: String,
    pub filter: String,
    pub connect: ConnectOptions,
    pub connect_timeout: Duration,
    pub retry_delay: Duration,
}

impl SubscriberOptions {
    pub fn new(broker: &str, filter: &str, client_id: &str) -> Self {
        Self {
            broker: broker.to_string(),
            filter: filter.to_string(),
            connect: ConnectOptions::new(client_id, Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Run sessions until `shutdown` flips.
pub async fn run(options: SubscriberOptions, store: Arc<MetricStore>, mut shutdown: watch::Receiver<bool>) {
    loop {
        match session(&options, &store, &mut shutdown).await {
            Ok(()) => break,
            Err(e) => warn!(
                broker = %options.broker,
                error = %e,
                retry_ms = options.retry_delay.as_millis() as u64,
                "broker session ended"
            ),
        }

        tokio::select! {
            _ = tokio::time::sleep(options.retry_delay) => {}
            _ = shutdown.changed() => break,
        }
    }
    debug!("subscriber stopped");
}

/// One broker session. `Ok` means shutdown was requested.
async fn session(
    options: &SubscriberOptions,
    store: &MetricStore,
    shutdown: &mut watch::Receiver<bool>,
) -> CollectorResult<()> {
    let mut client = MqttClient::connect(&options.broker, &options.connect, options.connect_timeout).await?;
    client.subscribe(&options.filter, options.connect_timeout).await?;
    info!(broker = %options.broker, filter = %options.filter, "subscribed");

    let ping_every = (options.connect.keep_alive / 2).max(Duration::from_secs(1));
    let mut keep_alive = tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            publish = client.next_publish() => {
                let publish = publish?;
                let ts = format_ts(Utc::now());
                match store.ingest(&publish.topic, &publish.payload, &ts) {
                    Ok(Some(record)) => debug!(
                        device = %record.device,
                        state = record.state.as_deref().unwrap_or("-"),
                        "metric stored"
                    ),
                    Ok(None) => {}
                    Err(e) => error!(topic = %publish.topic, error = %e, "failed to store metric"),
                }
            }
            _ = keep_alive.tick() => client.ping().await?,
            _ = shutdown.changed() => {
                let _ = client.disconnect().await;
                return Ok(());
            }
        }
    }
}
