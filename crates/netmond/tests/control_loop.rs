//! Control loop behaviour under paused time with scripted link and probes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use netmon_core::{Metrics, NetmonConfig, ProbeResult, Timestamp, Verdict};
use netmon_probe::{Probe, ProbeOutcome};
use netmond::{Link, Monitor, Presenter, TelemetryHandle};

#[derive(Clone)]
struct FakeLink {
    up: Arc<AtomicBool>,
    reconnects: Arc<AtomicUsize>,
}

impl FakeLink {
    fn new(up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
            reconnects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Link for FakeLink {
    fn is_up(&mut self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    fn reconnect(&mut self) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn signal_strength(&mut self) -> Option<i32> {
        Some(-48)
    }
}

#[derive(Clone)]
struct FixedProbe {
    result: ProbeResult,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FixedProbe {
    fn reachable(latency_ms: u64) -> Self {
        Self {
            result: ProbeResult::Reachable { latency_ms },
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for FixedProbe {
    async fn probe(&self) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.result)
    }
}

#[derive(Clone, Default)]
struct RecordingPanel {
    frames: Arc<Mutex<Vec<(Verdict, bool)>>>,
}

impl Presenter for RecordingPanel {
    fn render(&mut self, verdict: Verdict, _metrics: &Metrics, link_up: bool, _now: Timestamp) {
        self.frames.lock().unwrap().push((verdict, link_up));
    }
}

struct Harness {
    link: FakeLink,
    panel: RecordingPanel,
    payloads: mpsc::Receiver<String>,
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    fn start(config: NetmonConfig, link_up: bool, upstream: FixedProbe, downstream: FixedProbe) -> Self {
        let link = FakeLink::new(link_up);
        let panel = RecordingPanel::default();
        let (telemetry, payloads) = TelemetryHandle::channel(64);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let monitor = Monitor::new(&config, link.clone(), panel.clone(), Some(telemetry));
        let task = tokio::spawn(monitor.run(upstream, downstream, shutdown_rx));
        Self {
            link,
            panel,
            payloads,
            shutdown,
            task,
        }
    }

    /// Stop the loop and return the state of every published payload.
    async fn stop(mut self) -> Vec<String> {
        self.shutdown.send(true).unwrap();
        self.task.await.unwrap().unwrap();

        let mut states = Vec::new();
        while let Ok(raw) = self.payloads.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
            states.push(value["state"].as_str().unwrap().to_string());
        }
        states
    }
}

fn dedup(states: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for s in states {
        if out.last() != Some(&s.as_str()) {
            out.push(s);
        }
    }
    out
}

#[tokio::test(start_paused = true)]
async fn boot_grace_then_healthy() {
    let harness = Harness::start(
        NetmonConfig::default(),
        true,
        FixedProbe::reachable(20),
        FixedProbe::reachable(30),
    );
    tokio::time::sleep(Duration::from_millis(9_000)).await;
    let panel = harness.panel.clone();
    let states = harness.stop().await;

    assert_eq!(dedup(&states), ["REC", "OK"]);
    let frames = panel.frames.lock().unwrap();
    assert!(frames.iter().any(|f| *f == (Verdict::Healthy, true)));
}

#[tokio::test(start_paused = true)]
async fn disconnected_link_reconnects_at_most_every_interval() {
    let upstream = FixedProbe::reachable(20);
    let downstream = FixedProbe::reachable(30);
    let harness = Harness::start(NetmonConfig::default(), false, upstream.clone(), downstream.clone());

    // Sample ticks at 0, 2, 4, 6, 8 s; reconnect interval 3 s.
    tokio::time::sleep(Duration::from_millis(9_000)).await;
    let reconnects = harness.link.reconnects.clone();
    let panel = harness.panel.clone();
    let states = harness.stop().await;

    assert_eq!(reconnects.load(Ordering::SeqCst), 3);
    assert_eq!(upstream.calls(), 0);
    assert_eq!(downstream.calls(), 0);
    assert_eq!(dedup(&states), ["DOWN"]);
    assert!(panel.frames.lock().unwrap().iter().all(|(_, up)| !up));
}

#[tokio::test(start_paused = true)]
async fn slow_round_skips_overlapping_ticks() {
    let upstream = FixedProbe::reachable(20);
    let downstream = FixedProbe::reachable(30).slow(Duration::from_secs(5));
    let harness = Harness::start(NetmonConfig::default(), true, upstream, downstream.clone());

    // Round at 0 s finishes at 5 s; ticks at 2 and 4 s are skipped; next round at 6 s.
    tokio::time::sleep(Duration::from_millis(9_000)).await;
    harness.stop().await;

    assert_eq!(downstream.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn reconnect_opens_recovery_window() {
    let mut config = NetmonConfig::default();
    config.verdict.boot_window = Duration::ZERO;
    let harness = Harness::start(config, true, FixedProbe::reachable(20), FixedProbe::reachable(30));
    let up = harness.link.up.clone();

    tokio::time::sleep(Duration::from_millis(3_000)).await;
    up.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    up.store(true, Ordering::SeqCst);
    // Reconnect seen at 6 s, window open until 11 s, healthy again at 12 s.
    tokio::time::sleep(Duration::from_millis(8_000)).await;
    let states = harness.stop().await;

    assert_eq!(dedup(&states), ["OK", "DOWN", "REC", "OK"]);
}
