//! Local status presentation.
//!
//! Renders the same content as a 16x2 character display with four
//! indicator lights:
//!
//! ```text
//! ┌────────────────┐
//! │WiFi OK RSSI -56│   OK  DEG  DOWN  REC
//! │ST: OK R12 L4   │   ●   ○    ○     ○
//! └────────────────┘
//! ```
//!
//! [`ConsolePanel`] emits the frame through `tracing` whenever the text
//! changes.

use std::fmt;
use std::time::Duration;

use tracing::{info, trace};

use netmon_core::{Metrics, Timestamp, Verdict};

pub const COLUMNS: usize = 16;

/// Half-period of the Recovering indicator blink.
pub const BLINK_PHASE: Duration = Duration::from_millis(250);

/// Receives every display refresh.
pub trait Presenter: Send + 'static {
    fn render(&mut self, verdict: Verdict, metrics: &Metrics, link_up: bool, now: Timestamp);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Indicators {
    pub ok: bool,
    pub degraded: bool,
    pub down: bool,
    pub recovering: bool,
}

impl Indicators {
    /// Exactly one light per verdict; Recovering blinks.
    pub fn for_verdict(verdict: Verdict, now: Timestamp) -> Self {
        let mut lights = Self::default();
        match verdict {
            Verdict::Healthy => lights.ok = true,
            Verdict::Degraded => lights.degraded = true,
            Verdict::Unreachable => lights.down = true,
            Verdict::Recovering => lights.recovering = blink_on(now),
        }
        lights
    }
}

impl fmt::Display for Indicators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |on: bool| if on { "on" } else { "off" };
        write!(
            f,
            "OK:{} DEG:{} DOWN:{} REC:{}",
            mark(self.ok),
            mark(self.degraded),
            mark(self.down),
            mark(self.recovering)
        )
    }
}

fn blink_on(now: Timestamp) -> bool {
    (now.as_millis() / BLINK_PHASE.as_millis() as u64) % 2 == 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelFrame {
    pub lines: [String; 2],
    pub indicators: Indicators,
}

/// Lay out one frame.
pub fn compose(verdict: Verdict, metrics: &Metrics, link_up: bool, now: Timestamp) -> PanelFrame {
    let top = match (link_up, metrics.signal_strength) {
        (true, Some(dbm)) => format!("WiFi OK RSSI {dbm}"),
        (true, None) => "WiFi OK".to_string(),
        (false, _) => "WiFi DISCONNECTED".to_string(),
    };

    let bottom = match metrics.recovery_duration_secs {
        Some(secs) => format!("UP after {secs}s"),
        None => {
            let status = format!("ST: {}", verdict.label());
            let latencies = format!(
                " R{} L{}",
                latency_cell(metrics.upstream_latency_ms),
                latency_cell(metrics.downstream_latency_ms)
            );
            // Latencies are shown whole or not at all.
            if status.len() + latencies.len() <= COLUMNS {
                status + &latencies
            } else {
                status
            }
        }
    };

    PanelFrame {
        lines: [fit(&top), fit(&bottom)],
        indicators: Indicators::for_verdict(verdict, now),
    }
}

fn latency_cell(ms: Option<u64>) -> String {
    ms.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn fit(line: &str) -> String {
    let mut out: String = line.chars().take(COLUMNS).collect();
    let width = out.chars().count();
    out.extend(std::iter::repeat_n(' ', COLUMNS - width));
    out
}

/// Writes panel frames to the log.
#[derive(Debug, Default)]
pub struct ConsolePanel {
    last_lines: Option<[String; 2]>,
    updates: u64,
}

impl ConsolePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames whose text differed from the previous one.
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl Presenter for ConsolePanel {
    fn render(&mut self, verdict: Verdict, metrics: &Metrics, link_up: bool, now: Timestamp) {
        let frame = compose(verdict, metrics, link_up, now);
        if self.last_lines.as_ref() == Some(&frame.lines) {
            trace!(leds = %frame.indicators, "panel refresh");
            return;
        }
        info!(
            line0 = %frame.lines[0].trim_end(),
            line1 = %frame.lines[1].trim_end(),
            leds = %frame.indicators,
            "panel"
        );
        self.last_lines = Some(frame.lines);
        self.updates += 1;
    }
}
