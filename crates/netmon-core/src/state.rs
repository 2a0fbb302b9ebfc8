//! Monitor state owned by the control loop.
//!
//! All mutable health state lives in one [`MonitorState`] value. The loop
//! holds it exclusively and passes `&mut` into each update, so no locking
//! is involved.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::history::{DownPolicy, ProbeResult, Target, TargetRecord};
use crate::outage::OutageEpisode;
use crate::recovery::RecoveryWindow;
use crate::time::Timestamp;
use crate::verdict::{Verdict, evaluate};

/// Fixed thresholds and windows that govern state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPolicy {
    pub upstream_down: DownPolicy,
    pub downstream_down: DownPolicy,
    /// Start the upstream staleness clock at boot.
    pub seed_upstream: bool,
    /// Start the downstream staleness clock at boot.
    pub seed_downstream: bool,
    /// Latency at or above which a target is degraded.
    pub high_latency: Duration,
    /// Grace period after the link reassociates.
    pub recovery_window: Duration,
    /// Grace period after the link first comes up.
    pub boot_window: Duration,
    /// How long an outage-duration readout stays visible.
    pub outage_display: Duration,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            upstream_down: DownPolicy::default(),
            downstream_down: DownPolicy::default(),
            seed_upstream: false,
            seed_downstream: false,
            high_latency: Duration::from_millis(80),
            recovery_window: Duration::from_millis(5_000),
            boot_window: Duration::from_millis(5_000),
            outage_display: Duration::from_millis(5_000),
        }
    }
}

impl MonitorPolicy {
    pub fn down_policy(&self, target: Target) -> DownPolicy {
        match target {
            Target::Upstream => self.upstream_down,
            Target::Downstream => self.downstream_down,
        }
    }
}

/// Link-layer transition seen by [`MonitorState::observe_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEdge {
    /// First time the link was seen up since start.
    FirstUp,
    /// The link came back after being down.
    Reconnected,
    /// The link was lost.
    Lost,
    Unchanged,
}

/// Values shown alongside the verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub upstream_latency_ms: Option<u64>,
    pub downstream_latency_ms: Option<u64>,
    pub signal_strength: Option<i32>,
    pub recovery_duration_secs: Option<u64>,
}

/// A verdict with the metrics it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub verdict: Verdict,
    pub metrics: Metrics,
}

/// Everything the verdict engine reads.
#[derive(Debug, Clone)]
pub struct MonitorState {
    /// `None` until the link has been polled once.
    link: Option<bool>,
    signal_strength: Option<i32>,
    upstream: TargetRecord,
    downstream: TargetRecord,
    outage: OutageEpisode,
    recovery: RecoveryWindow,
}

impl MonitorState {
    pub fn new(policy: &MonitorPolicy, now: Timestamp) -> Self {
        let record = |seed: bool| {
            if seed {
                TargetRecord::seeded(now)
            } else {
                TargetRecord::new()
            }
        };
        Self {
            link: None,
            signal_strength: None,
            upstream: record(policy.seed_upstream),
            downstream: record(policy.seed_downstream),
            outage: OutageEpisode::new(),
            recovery: RecoveryWindow::new(),
        }
    }

    /// Feed the polled link state, opening the boot or reconnect grace
    /// period on an up edge.
    pub fn observe_link(&mut self, up: bool, now: Timestamp, policy: &MonitorPolicy) -> LinkEdge {
        let edge = match (self.link, up) {
            (None, true) => {
                info!(at = %now, window_ms = policy.boot_window.as_millis() as u64, "link up");
                self.recovery.open(now, policy.boot_window);
                LinkEdge::FirstUp
            }
            (Some(false), true) => {
                info!(at = %now, window_ms = policy.recovery_window.as_millis() as u64, "link reconnected");
                self.recovery.open(now, policy.recovery_window);
                LinkEdge::Reconnected
            }
            (Some(true), false) => {
                warn!(at = %now, "link lost");
                LinkEdge::Lost
            }
            _ => LinkEdge::Unchanged,
        };
        self.link = Some(up);
        edge
    }

    pub fn set_signal_strength(&mut self, dbm: Option<i32>) {
        self.signal_strength = dbm;
    }

    /// Record one probe attempt for `target`.
    pub fn record(&mut self, target: Target, result: ProbeResult, now: Timestamp, policy: &MonitorPolicy) {
        let down_policy = policy.down_policy(target);
        let record = match target {
            Target::Upstream => &mut self.upstream,
            Target::Downstream => &mut self.downstream,
        };
        let was_down = record.is_down(down_policy, now);
        record.record(result, now);
        let is_down = record.is_down(down_policy, now);

        debug!(
            %target,
            ok = result.succeeded(),
            latency_ms = result.latency_ms(),
            failures = record.consecutive_failures(),
            "probe recorded"
        );
        if is_down && !was_down {
            warn!(%target, failures = record.consecutive_failures(), "target marked down");
        } else if was_down && !is_down {
            info!(%target, "target back up");
        }
    }

    /// Run the outage edge detector over the downstream down state.
    /// Call once per round, after the downstream record is updated.
    pub fn observe_downstream(&mut self, now: Timestamp, policy: &MonitorPolicy) {
        let up = !self.downstream.is_down(policy.downstream_down, now);
        self.outage.observe(up, now, policy.outage_display);
    }

    /// Apply one sampling round: record whatever was sampled, then run
    /// the outage detector.
    pub fn apply_round(
        &mut self,
        upstream: Option<ProbeResult>,
        downstream: Option<ProbeResult>,
        now: Timestamp,
        policy: &MonitorPolicy,
    ) {
        if let Some(result) = upstream {
            self.record(Target::Upstream, result, now, policy);
        }
        if let Some(result) = downstream {
            self.record(Target::Downstream, result, now, policy);
        }
        self.observe_downstream(now, policy);
    }

    pub fn is_connected(&self) -> bool {
        self.link == Some(true)
    }

    pub fn target(&self, target: Target) -> &TargetRecord {
        match target {
            Target::Upstream => &self.upstream,
            Target::Downstream => &self.downstream,
        }
    }

    pub fn upstream(&self) -> &TargetRecord {
        &self.upstream
    }

    pub fn downstream(&self) -> &TargetRecord {
        &self.downstream
    }

    pub fn outage(&self) -> &OutageEpisode {
        &self.outage
    }

    pub fn recovery(&self) -> &RecoveryWindow {
        &self.recovery
    }

    pub fn signal_strength(&self) -> Option<i32> {
        self.signal_strength
    }

    pub fn metrics(&self, now: Timestamp) -> Metrics {
        Metrics {
            upstream_latency_ms: self.upstream.last_latency_ms(),
            downstream_latency_ms: self.downstream.last_latency_ms(),
            signal_strength: self.signal_strength,
            recovery_duration_secs: self.outage.recovery_readout(now),
        }
    }

    /// Evaluate the verdict and snapshot the metrics at `now`.
    pub fn report(&self, policy: &MonitorPolicy, now: Timestamp) -> Report {
        Report {
            verdict: evaluate(self, policy, now),
            metrics: self.metrics(now),
        }
    }
}
