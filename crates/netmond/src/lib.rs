//! netmond: the network health probe daemon.
//!
//! Wires the pieces around the `netmon-core` state machine:
//! - [`link`]: interface carrier, signal level, reconnect command
//! - [`worker`]: probes run off the control loop
//! - [`monitor`]: the control loop owning all monitor state
//! - [`panel`]: 16x2 status display and indicator lights
//! - [`publisher`]: MQTT telemetry task

pub mod clock;
pub mod link;
pub mod monitor;
pub mod panel;
pub mod publisher;
pub mod schedule;
pub mod throttle;
pub mod worker;

pub use clock::MonotonicClock;
pub use link::{Link, SysfsLink};
pub use monitor::Monitor;
pub use panel::{ConsolePanel, Presenter};
pub use publisher::{PublisherOptions, TelemetryHandle};
