//! Minimum-interval gate for reconnect attempts.

use std::time::Duration;

use netmon_core::Timestamp;

/// Allows one attempt per `interval`.
///
/// The first attempt is always allowed.
#[derive(Debug, Clone)]
pub struct ReconnectThrottle {
    interval: Duration,
    last_attempt: Option<Timestamp>,
}

impl ReconnectThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    /// Returns `true` and records the attempt if one is allowed at `now`.
    pub fn try_acquire(&mut self, now: Timestamp) -> bool {
        let ready = match self.last_attempt {
            None => true,
            Some(last) => now.saturating_since(last) >= self.interval,
        };
        if ready {
            self.last_attempt = Some(now);
        }
        ready
    }

    pub fn last_attempt(&self) -> Option<Timestamp> {
        self.last_attempt
    }
}
