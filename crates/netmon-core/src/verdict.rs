//! The verdict engine.
//!
//! [`evaluate`] is the single place where the health precedence lives.
//! Rules are checked in order and the first match wins:
//!
//! | # | Condition | Verdict |
//! |---|---|---|
//! | 1 | link down | `Unreachable` |
//! | 2 | outage-duration readout on screen | `Recovering` |
//! | 3 | post-reconnect grace period | `Recovering` |
//! | 4 | upstream down | `Unreachable` |
//! | 5 | downstream down | `Degraded` |
//! | 6 | last good latency of either target ≥ threshold | `Degraded` |
//! | 7 | either target never answered | `Recovering` |
//! | 8 | otherwise | `Healthy` |
//!
//! Consumers pattern-match on [`Verdict`]; none of them re-derive it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::{MonitorPolicy, MonitorState};
use crate::time::Timestamp;

/// Health classification for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Healthy,
    Degraded,
    Unreachable,
    Recovering,
}

impl Verdict {
    /// Short code used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Verdict::Healthy => "OK",
            Verdict::Degraded => "DEG",
            Verdict::Unreachable => "DOWN",
            Verdict::Recovering => "REC",
        }
    }

    /// Long label used on the local display.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Healthy => "OK",
            Verdict::Degraded => "DEGRADED",
            Verdict::Unreachable => "DOWN",
            Verdict::Recovering => "RECOVERING",
        }
    }

    /// Parse either the wire code or the display label.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Some(Verdict::Healthy),
            "DEG" | "DEGRADED" => Some(Verdict::Degraded),
            "DOWN" => Some(Verdict::Unreachable),
            "REC" | "RECOVERING" => Some(Verdict::Recovering),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compute the verdict for `state` at `now`. Reads only.
pub fn evaluate(state: &MonitorState, policy: &MonitorPolicy, now: Timestamp) -> Verdict {
    if !state.is_connected() {
        return Verdict::Unreachable;
    }
    if state.outage().readout_active(now) {
        return Verdict::Recovering;
    }
    if state.recovery().is_active(now) {
        return Verdict::Recovering;
    }

    let upstream = state.upstream();
    let downstream = state.downstream();

    if upstream.is_down(policy.upstream_down, now) {
        return Verdict::Unreachable;
    }
    if downstream.is_down(policy.downstream_down, now) {
        return Verdict::Degraded;
    }

    let high_ms = u64::try_from(policy.high_latency.as_millis()).unwrap_or(u64::MAX);
    let slow = [upstream, downstream]
        .iter()
        .any(|r| r.last_good_latency_ms().is_some_and(|ms| ms >= high_ms));
    if slow {
        return Verdict::Degraded;
    }

    if !upstream.ever_succeeded() || !downstream.ever_succeeded() {
        return Verdict::Recovering;
    }

    Verdict::Healthy
}
