//! Normalized metric records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use netmon_mqtt::device_from_topic;

pub const UNKNOWN_DEVICE: &str = "unknown";

/// One telemetry message as stored and served by the collector.
///
/// Numeric fields are `None` when the device omitted them or sent a
/// non-integer value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub ts: String,
    pub topic: String,
    pub device: String,
    pub rssi: Option<i64>,
    pub router_ms: Option<i64>,
    pub linux_ms: Option<i64>,
    pub state: Option<String>,
}

impl MetricRecord {
    /// Normalize a message body. Returns `None` unless it is a JSON object.
    pub fn from_message(topic: &str, payload: &[u8], ts: &str) -> Option<Self> {
        let value: Value = serde_json::from_slice(payload).ok()?;
        let body = value.as_object()?;
        let int = |key: &str| body.get(key).and_then(Value::as_i64);
        Some(Self {
            ts: ts.to_string(),
            topic: topic.to_string(),
            device: device_from_topic(topic).unwrap_or(UNKNOWN_DEVICE).to_string(),
            rssi: int("rssi"),
            router_ms: int("router_ms"),
            linux_ms: int("linux_ms"),
            state: body.get("state").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Line appended to `metrics.log`.
    pub fn log_line(&self) -> String {
        format!(
            "{} device={} rssi={} router_ms={} linux_ms={} state={}",
            self.ts,
            self.device,
            field(self.rssi),
            field(self.router_ms),
            field(self.linux_ms),
            self.state.as_deref().unwrap_or("-"),
        )
    }
}

fn field(v: Option<i64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Line appended to `metrics.log` for a body that is not a JSON object.
pub fn raw_line(ts: &str, topic: &str, payload: &[u8]) -> String {
    format!("{ts} topic={topic} raw={}", String::from_utf8_lossy(payload))
}

/// `YYYY-MM-DDTHH:MM:SSZ`
pub fn format_ts(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
