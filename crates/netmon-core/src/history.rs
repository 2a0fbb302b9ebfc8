//! Per-target probe history.
//!
//! Each monitored target keeps a [`TargetRecord`]: the last result, the
//! consecutive failure count, and when it last answered. Whether a target
//! counts as down is decided by its [`DownPolicy`], which is fixed for the
//! life of the process.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::{Timestamp, duration_str};

/// One of the two fixed targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The link-layer gateway. On the critical path.
    Upstream,
    /// The monitored host behind the gateway.
    Downstream,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Target::Upstream => "upstream",
            Target::Downstream => "downstream",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The target answered after `latency_ms`.
    Reachable { latency_ms: u64 },
    /// No answer within the attempt's timeout.
    Unreachable,
}

impl ProbeResult {
    pub fn succeeded(self) -> bool {
        matches!(self, ProbeResult::Reachable { .. })
    }

    pub fn latency_ms(self) -> Option<u64> {
        match self {
            ProbeResult::Reachable { latency_ms } => Some(latency_ms),
            ProbeResult::Unreachable => None,
        }
    }
}

/// How a target is judged to be down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownPolicy {
    /// Down once this many attempts in a row have failed.
    Count { failures: u32 },
    /// Down once the last success is older than `after`.
    Staleness {
        #[serde(with = "duration_str")]
        after: Duration,
    },
}

impl Default for DownPolicy {
    fn default() -> Self {
        DownPolicy::Count { failures: 3 }
    }
}

/// Rolling state for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRecord {
    last_latency_ms: Option<u64>,
    last_good_latency_ms: Option<u64>,
    last_succeeded: bool,
    consecutive_failures: u32,
    last_success_at: Option<Timestamp>,
}

impl TargetRecord {
    /// A record that has never been sampled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record whose staleness clock starts at `now`, so a staleness
    /// policy does not report the target down before the first sample.
    pub fn seeded(now: Timestamp) -> Self {
        Self {
            last_success_at: Some(now),
            ..Self::default()
        }
    }

    /// Fold one probe attempt into the record.
    pub fn record(&mut self, result: ProbeResult, now: Timestamp) {
        match result {
            ProbeResult::Reachable { latency_ms } => {
                self.last_succeeded = true;
                self.last_latency_ms = Some(latency_ms);
                self.last_good_latency_ms = Some(latency_ms);
                self.consecutive_failures = 0;
                self.last_success_at = Some(now);
            }
            ProbeResult::Unreachable => {
                self.last_succeeded = false;
                self.last_latency_ms = None;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
        }
    }

    /// Whether the target is down under `policy` at `now`.
    pub fn is_down(&self, policy: DownPolicy, now: Timestamp) -> bool {
        match policy {
            DownPolicy::Count { failures } => self.consecutive_failures >= failures,
            DownPolicy::Staleness { after } => match self.last_success_at {
                Some(at) => now.saturating_since(at) > after,
                None => true,
            },
        }
    }

    /// Latency of the last attempt, `None` if it failed or none was made.
    pub fn last_latency_ms(&self) -> Option<u64> {
        self.last_latency_ms
    }

    /// Latency of the most recent success, kept across later failures.
    pub fn last_good_latency_ms(&self) -> Option<u64> {
        self.last_good_latency_ms
    }

    /// Whether the target has ever answered.
    pub fn ever_succeeded(&self) -> bool {
        self.last_good_latency_ms.is_some()
    }

    pub fn last_succeeded(&self) -> bool {
        self.last_succeeded
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success_at(&self) -> Option<Timestamp> {
        self.last_success_at
    }
}
