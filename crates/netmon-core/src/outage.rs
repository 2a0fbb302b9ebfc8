//! Outage timing for the downstream target.
//!
//! [`OutageEpisode`] is an edge detector over the downstream up/down
//! signal. On a down→up edge it records how long the target was down and
//! keeps that readout visible for a fixed window.

use std::time::Duration;

use tracing::{info, warn};

use crate::time::Timestamp;

/// Edge-detected outage state for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutageEpisode {
    was_up: bool,
    down_since: Option<Timestamp>,
    last_recovery_duration_secs: Option<u64>,
    display_until: Option<Timestamp>,
}

impl Default for OutageEpisode {
    fn default() -> Self {
        Self::new()
    }
}

impl OutageEpisode {
    /// Starts in the up state so process start is not read as a recovery.
    pub fn new() -> Self {
        Self {
            was_up: true,
            down_since: None,
            last_recovery_duration_secs: None,
            display_until: None,
        }
    }

    /// Feed the current reachability. `display` is how long a recovery
    /// readout stays visible.
    pub fn observe(&mut self, now_up: bool, now: Timestamp, display: Duration) {
        match (self.was_up, now_up) {
            (true, false) => {
                warn!(at = %now, "downstream outage started");
                self.down_since = Some(now);
            }
            (false, true) => {
                let secs = self
                    .down_since
                    .map(|since| now.saturating_since(since).as_secs())
                    .unwrap_or(0);
                info!(at = %now, down_secs = secs, "downstream recovered");
                self.last_recovery_duration_secs = Some(secs);
                self.display_until = Some(now + display);
            }
            _ => {}
        }
        self.was_up = now_up;
    }

    /// Whether the recovery readout is on screen at `now`.
    pub fn readout_active(&self, now: Timestamp) -> bool {
        self.display_until.is_some_and(|until| now < until)
    }

    /// The last outage duration, only while its readout window is open.
    pub fn recovery_readout(&self, now: Timestamp) -> Option<u64> {
        if self.readout_active(now) {
            self.last_recovery_duration_secs
        } else {
            None
        }
    }

    pub fn was_up(&self) -> bool {
        self.was_up
    }

    pub fn down_since(&self) -> Option<Timestamp> {
        self.down_since
    }

    /// Raw last duration regardless of the window. Prefer
    /// [`recovery_readout`](Self::recovery_readout) for display.
    pub fn last_recovery_duration_secs(&self) -> Option<u64> {
        self.last_recovery_duration_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(5_000);

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    #[test]
    fn down_edge_stamps_down_since() {
        let mut ep = OutageEpisode::new();
        ep.observe(false, ms(4_000), WINDOW);
        assert_eq!(ep.down_since(), Some(ms(4_000)));
        assert!(!ep.was_up());
        assert_eq!(ep.last_recovery_duration_secs(), None);
    }

    #[test]
    fn up_edge_measures_outage_in_whole_seconds() {
        let mut ep = OutageEpisode::new();
        ep.observe(false, ms(4_000), WINDOW);
        ep.observe(true, ms(10_999), WINDOW);
        assert_eq!(ep.last_recovery_duration_secs(), Some(6));
    }

    #[test]
    fn readout_is_one_shot_over_window() {
        let mut ep = OutageEpisode::new();
        ep.observe(false, ms(4_000), WINDOW);
        ep.observe(true, ms(10_000), WINDOW);

        for t in [10_000, 12_500, 14_999] {
            assert!(ep.readout_active(ms(t)));
            assert_eq!(ep.recovery_readout(ms(t)), Some(6));
        }
        assert!(!ep.readout_active(ms(15_000)));
        assert_eq!(ep.recovery_readout(ms(15_000)), None);
    }

    #[test]
    fn observe_without_edge_is_idempotent() {
        let mut ep = OutageEpisode::new();
        ep.observe(false, ms(1_000), WINDOW);
        let before = ep.clone();

        ep.observe(false, ms(3_000), WINDOW);
        ep.observe(false, ms(5_000), WINDOW);
        assert_eq!(ep.down_since(), before.down_since());
        assert_eq!(
            ep.last_recovery_duration_secs(),
            before.last_recovery_duration_secs()
        );

        ep.observe(true, ms(7_000), WINDOW);
        let after_recovery = ep.clone();
        ep.observe(true, ms(9_000), WINDOW);
        assert_eq!(ep, after_recovery);
    }

    #[test]
    fn recovery_without_down_since_reports_zero() {
        let mut ep = OutageEpisode {
            was_up: false,
            down_since: None,
            last_recovery_duration_secs: None,
            display_until: None,
        };
        ep.observe(true, ms(2_000), WINDOW);
        assert_eq!(ep.recovery_readout(ms(2_000)), Some(0));
    }

    #[test]
    fn staying_up_from_start_never_opens_readout() {
        let mut ep = OutageEpisode::new();
        ep.observe(true, ms(0), WINDOW);
        ep.observe(true, ms(2_000), WINDOW);
        assert!(!ep.readout_active(ms(2_000)));
    }
}
