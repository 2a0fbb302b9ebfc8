//! netmon-mqtt: the MQTT 3.1.1 subset used by netmon.
//!
//! The probe daemon publishes one JSON payload per sample on
//! `netmon/<device>/metrics`; the collector subscribes to `netmon/+/metrics`.
//! Only QoS 0 is spoken, which keeps the session stateless.
//!
//! ```text
//!   netmond                      broker                    collector
//!     │── CONNECT ──────────────▶ │ ◀────────────── CONNECT ──│
//!     │◀───────────── CONNACK ─── │ ─── CONNACK ─────────────▶│
//!     │                           │ ◀──── SUBSCRIBE netmon/+/…│
//!     │                           │ ─── SUBACK ──────────────▶│
//!     │── PUBLISH netmon/x/… ───▶ │ ─── PUBLISH ─────────────▶│
//!     │── PINGREQ ──────────────▶ │                           │
//!     │◀───────────── PINGRESP ── │                           │
//! ```

pub mod client;
pub mod codec;
pub mod error;

pub use client::{ConnectOptions, MqttClient};
pub use codec::{Packet, Publish};
pub use error::{MqttError, MqttResult};

/// Extract the device id from `netmon/<device>/metrics`.
///
/// Returns `None` for topics with fewer than three levels.
pub fn device_from_topic(topic: &str) -> Option<&str> {
    let mut levels = topic.split('/');
    let _prefix = levels.next()?;
    let device = levels.next()?;
    levels.next()?;
    Some(device)
}
