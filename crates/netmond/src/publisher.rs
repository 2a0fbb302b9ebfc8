//! Telemetry publisher task.
//!
//! The control loop hands encoded payloads to [`TelemetryHandle::publish`],
//! which never waits: when the queue is full the payload is dropped. The
//! task owns the broker session, reconnecting at most once per
//! `reconnect_interval` and discarding payloads while no session exists.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use netmon_core::{Clock, NetmonConfig, TelemetryPayload};
use netmon_mqtt::{ConnectOptions, MqttClient};

use crate::clock::MonotonicClock;
use crate::throttle::ReconnectThrottle;

/// Payloads buffered between the loop and the publisher.
pub const QUEUE_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub struct PublisherOptions {
    pub broker: String,
    pub topic: String,
    pub connect: ConnectOptions,
    pub connect_timeout: Duration,
    pub reconnect_interval: Duration,
}

impl PublisherOptions {
    pub fn from_config(config: &NetmonConfig) -> Self {
        Self {
            broker: config.telemetry.broker.clone(),
            topic: config.telemetry_topic(),
            connect: ConnectOptions::new(&config.telemetry_client_id(), config.telemetry.keep_alive),
            connect_timeout: config.telemetry.connect_timeout,
            reconnect_interval: config.telemetry.reconnect_interval,
        }
    }
}

/// Sending side held by the control loop.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    tx: mpsc::Sender<String>,
}

impl TelemetryHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue one payload. Returns `false` if it was dropped.
    pub fn publish(&self, payload: &TelemetryPayload) -> bool {
        match self.tx.try_send(payload.encode()) {
            Ok(()) => true,
            Err(_) => {
                trace!(state = %payload.state, "telemetry queue full, payload dropped");
                false
            }
        }
    }
}

/// Spawn the publisher. It exits once every handle is dropped.
pub fn spawn(options: PublisherOptions) -> (TelemetryHandle, JoinHandle<()>) {
    let (handle, rx) = TelemetryHandle::channel(QUEUE_DEPTH);
    let task = tokio::spawn(run(options, rx));
    (handle, task)
}

async fn run(options: PublisherOptions, mut rx: mpsc::Receiver<String>) {
    let clock = MonotonicClock::new();
    let mut throttle = ReconnectThrottle::new(options.reconnect_interval);
    let mut session: Option<MqttClient> = None;

    let ping_every = (options.connect.keep_alive / 2).max(Duration::from_secs(1));
    let mut keep_alive = tokio::time::interval(ping_every);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(broker = %options.broker, topic = %options.topic, "telemetry publisher started");

    loop {
        tokio::select! {
            payload = rx.recv() => {
                let Some(payload) = payload else { break };

                if session.is_none() && throttle.try_acquire(clock.now()) {
                    session = connect(&options).await;
                }
                let Some(client) = session.as_mut() else {
                    trace!("no broker session, payload dropped");
                    continue;
                };
                if let Err(e) = client.publish(&options.topic, payload).await {
                    warn!(broker = %options.broker, error = %e, "publish failed, dropping session");
                    session = None;
                }
            }
            _ = keep_alive.tick(), if session.is_some() => {
                if let Some(client) = session.as_mut() {
                    if let Err(e) = client.ping().await {
                        warn!(broker = %options.broker, error = %e, "keep-alive failed, dropping session");
                        session = None;
                    }
                }
            }
        }
    }

    if let Some(client) = session {
        let _ = client.disconnect().await;
    }
    debug!("telemetry publisher stopped");
}

async fn connect(options: &PublisherOptions) -> Option<MqttClient> {
    match MqttClient::connect(&options.broker, &options.connect, options.connect_timeout).await {
        Ok(client) => {
            info!(broker = %options.broker, "connected to broker");
            Some(client)
        }
        Err(e) => {
            debug!(broker = %options.broker, error = %e, "broker unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use netmon_core::{Metrics, Report, Verdict};

    use super::*;

    fn payload(verdict: Verdict) -> TelemetryPayload {
        TelemetryPayload::from_report(&Report {
            verdict,
            metrics: Metrics {
                upstream_latency_ms: Some(3),
                downstream_latency_ms: None,
                signal_strength: Some(-61),
                recovery_duration_secs: None,
            },
        })
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (handle, mut rx) = TelemetryHandle::channel(1);
        assert!(handle.publish(&payload(Verdict::Healthy)));
        assert!(!handle.publish(&payload(Verdict::Degraded)));

        let queued = rx.try_recv().unwrap();
        assert_eq!(queued, r#"{"rssi":-61,"router_ms":3,"linux_ms":-1,"state":"OK"}"#);
    }

    #[test]
    fn options_follow_device_id() {
        let mut config = NetmonConfig::default();
        config.device.id = "attic".to_string();
        let options = PublisherOptions::from_config(&config);
        assert_eq!(options.topic, "netmon/attic/metrics");
        assert_eq!(options.connect.client_id, "netmon-attic");
    }

    #[tokio::test]
    async fn unreachable_broker_drops_payloads_quietly() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut config = NetmonConfig::default();
        config.telemetry.broker = format!("127.0.0.1:{port}");
        let (handle, task) = spawn(PublisherOptions::from_config(&config));

        assert!(handle.publish(&payload(Verdict::Unreachable)));
        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    /// A listener that counts sessions and hangs up before CONNACK.
    async fn hangup_broker() -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });
        (addr, accepted)
    }

    async fn wait_for(accepted: &AtomicUsize, count: usize) {
        for _ in 0..200 {
            if accepted.load(Ordering::SeqCst) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} connect attempts, saw {}", accepted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn reconnects_at_most_once_per_interval() {
        let (broker, accepted) = hangup_broker().await;
        let options = PublisherOptions {
            broker,
            topic: "netmon/attic/metrics".to_string(),
            connect: ConnectOptions::new("netmon-attic", Duration::from_secs(30)),
            connect_timeout: Duration::from_millis(200),
            reconnect_interval: Duration::from_millis(600),
        };
        let (handle, task) = spawn(options);

        for _ in 0..4 {
            assert!(handle.publish(&payload(Verdict::Unreachable)));
        }
        wait_for(&accepted, 1).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.publish(&payload(Verdict::Unreachable)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.publish(&payload(Verdict::Recovering)));
        wait_for(&accepted, 2).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 2);

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
