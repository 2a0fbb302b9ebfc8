//! The control loop.
//!
//! One task owns the [`MonitorState`] and reacts to four events:
//!
//! ```text
//!   sample tick ──▶ poll link ──┬─ down ─▶ throttled reconnect, publish DOWN
//!                               └─ up ───▶ dispatch round (unless one is in flight)
//!   round result ─▶ record both targets, outage edge, evaluate, publish
//!                   (dropped if the link went down meanwhile)
//!   display tick ─▶ evaluate at render time, panel.render
//!   shutdown ─────▶ stop worker, return
//! ```
//!
//! Verdicts are always computed from the state at the moment of use, so
//! the recovery and outage windows expire on time even between rounds.

use anyhow::bail;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use netmon_core::config::CadenceConfig;
use netmon_core::{
    Clock, MonitorPolicy, MonitorState, NetmonConfig, ProbeResult, Target, TelemetryPayload, Verdict,
};
use netmon_probe::{Probe, ProbeOutcome, outcome_to_result};

use crate::clock::MonotonicClock;
use crate::link::Link;
use crate::panel::Presenter;
use crate::publisher::TelemetryHandle;
use crate::schedule::SampleSchedule;
use crate::throttle::ReconnectThrottle;
use crate::worker::{ProbeWorker, RoundOutcome};

pub struct Monitor<L: Link, P: Presenter> {
    policy: MonitorPolicy,
    cadence: CadenceConfig,
    clock: MonotonicClock,
    state: MonitorState,
    link: L,
    panel: P,
    telemetry: Option<TelemetryHandle>,
    schedule: SampleSchedule,
    link_throttle: ReconnectThrottle,
    round_in_flight: bool,
    last_verdict: Option<Verdict>,
}

impl<L: Link, P: Presenter> Monitor<L, P> {
    pub fn new(config: &NetmonConfig, link: L, panel: P, telemetry: Option<TelemetryHandle>) -> Self {
        let policy = config.monitor_policy();
        let clock = MonotonicClock::new();
        let state = MonitorState::new(&policy, clock.now());
        Self {
            policy,
            cadence: config.cadence.clone(),
            clock,
            state,
            link,
            panel,
            telemetry,
            schedule: SampleSchedule::new(config.cadence.upstream_every),
            link_throttle: ReconnectThrottle::new(config.link.reconnect_interval),
            round_in_flight: false,
            last_verdict: None,
        }
    }

    /// Run until `shutdown` flips or its sender is dropped.
    pub async fn run<U: Probe, D: Probe>(
        mut self,
        upstream: U,
        downstream: D,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let mut worker = ProbeWorker::spawn(upstream, downstream);

        let mut sample = tokio::time::interval(self.cadence.sample_interval);
        sample.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut display = tokio::time::interval(self.cadence.display_interval);
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            sample_ms = self.cadence.sample_interval.as_millis() as u64,
            display_ms = self.cadence.display_interval.as_millis() as u64,
            upstream_every = self.cadence.upstream_every,
            "monitor loop starting"
        );

        loop {
            tokio::select! {
                _ = sample.tick() => self.on_sample_tick(&worker),
                outcome = worker.next_outcome() => match outcome {
                    Some(outcome) => self.on_round(outcome),
                    None => bail!("probe worker exited unexpectedly"),
                },
                _ = display.tick() => self.on_display_tick(),
                _ = shutdown.changed() => {
                    info!("monitor loop shutting down");
                    break;
                }
            }
        }

        worker.shutdown();
        Ok(())
    }

    fn on_sample_tick(&mut self, worker: &ProbeWorker) {
        let now = self.clock.now();
        let up = self.link.is_up();
        self.state.observe_link(up, now, &self.policy);
        let rssi = if up { self.link.signal_strength() } else { None };
        self.state.set_signal_strength(rssi);

        if !up {
            if self.link_throttle.try_acquire(now) {
                info!("link down, attempting reconnect");
                self.link.reconnect();
            }
            self.publish();
            return;
        }

        if self.round_in_flight {
            debug!("previous round still in flight, skipping dispatch");
            return;
        }
        let plan = self.schedule.next_round();
        if worker.dispatch(plan) {
            self.round_in_flight = true;
        } else {
            warn!("probe worker not accepting rounds");
        }
    }

    fn on_round(&mut self, outcome: RoundOutcome) {
        self.round_in_flight = false;
        // A round dispatched before a disconnect says nothing about the targets.
        if !self.state.is_connected() {
            debug!("link went down during the round, discarding results");
            return;
        }
        let now = self.clock.now();
        let upstream = outcome.upstream.map(|o| settle(Target::Upstream, o));
        let downstream = outcome.downstream.map(|o| settle(Target::Downstream, o));
        self.state.apply_round(upstream, downstream, now, &self.policy);
        self.publish();
    }

    fn on_display_tick(&mut self) {
        let now = self.clock.now();
        let report = self.state.report(&self.policy, now);
        self.note_verdict(report.verdict);
        self.panel
            .render(report.verdict, &report.metrics, self.state.is_connected(), now);
    }

    fn publish(&mut self) {
        let report = self.state.report(&self.policy, self.clock.now());
        self.note_verdict(report.verdict);
        if let Some(telemetry) = &self.telemetry {
            telemetry.publish(&TelemetryPayload::from_report(&report));
        }
    }

    fn note_verdict(&mut self, verdict: Verdict) {
        if self.last_verdict == Some(verdict) {
            return;
        }
        info!(
            from = self.last_verdict.map_or("-", Verdict::code),
            to = verdict.code(),
            "verdict changed"
        );
        self.last_verdict = Some(verdict);
    }
}

/// A probe fault is logged and counted as a failed attempt.
fn settle(target: Target, outcome: ProbeOutcome) -> ProbeResult {
    if let Err(e) = &outcome {
        warn!(%target, error = %e, "probe fault");
    }
    outcome_to_result(&outcome)
}
