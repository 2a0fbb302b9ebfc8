//! netmon-core: the health-determination state machine.
//!
//! Fuses link connectivity, per-target probe history, and time-windowed
//! transition effects into a single [`Verdict`] per evaluation.
//!
//! # Architecture
//!
//! ```text
//! MonitorState (owned by the control loop)
//!   ├── link: polled up/down, opens the RecoveryWindow on an up edge
//!   ├── TargetRecord × 2 (upstream, downstream) ← ProbeResult per round
//!   ├── OutageEpisode ← downstream down/up edges, one-shot duration readout
//!   └── RecoveryWindow
//!
//! evaluate(&MonitorState, &MonitorPolicy, now) → Verdict
//! Report { verdict, metrics } → TelemetryPayload (wire JSON)
//! ```
//!
//! Nothing here performs I/O. Probing, display, and publishing live in
//! the `netmond` daemon and talk to this crate through plain values.

pub mod config;
pub mod error;
pub mod history;
pub mod outage;
pub mod payload;
pub mod recovery;
pub mod state;
pub mod time;
pub mod verdict;

pub use config::{NetmonConfig, ProbeMethod, TargetConfig};
pub use error::{ConfigError, ConfigResult};
pub use history::{DownPolicy, ProbeResult, Target, TargetRecord};
pub use outage::OutageEpisode;
pub use payload::TelemetryPayload;
pub use recovery::RecoveryWindow;
pub use state::{LinkEdge, Metrics, MonitorPolicy, MonitorState, Report};
pub use time::{Clock, Timestamp};
pub use verdict::{Verdict, evaluate};
