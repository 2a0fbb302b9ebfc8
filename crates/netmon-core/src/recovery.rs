//! Post-reconnect grace period for the link layer.

use std::time::Duration;

use crate::time::Timestamp;

/// A window during which the verdict is held at `Recovering` after the
/// link comes back, so probes can settle before `Healthy` is claimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryWindow {
    active_until: Option<Timestamp>,
}

impl RecoveryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or re-open) the window for `len` starting at `now`.
    pub fn open(&mut self, now: Timestamp, len: Duration) {
        self.active_until = Some(now + len);
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        self.active_until.is_some_and(|until| now < until)
    }

    pub fn active_until(&self) -> Option<Timestamp> {
        self.active_until
    }
}
