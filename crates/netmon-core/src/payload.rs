//! Telemetry payload published to the collector.
//!
//! The wire format is fixed by existing collectors: a flat, single-line
//! JSON object with exactly four keys in this order:
//!
//! ```text
//! {"rssi":-52,"router_ms":30,"linux_ms":20,"state":"OK"}
//! ```
//!
//! `router_ms` carries the upstream latency and `linux_ms` the downstream
//! latency, each `-1` when the last attempt failed. A missing signal
//! strength is published as `0`.

use serde::{Deserialize, Serialize};

use crate::state::Report;

/// One telemetry message. Field order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub rssi: i32,
    pub router_ms: i64,
    pub linux_ms: i64,
    pub state: String,
}

impl TelemetryPayload {
    pub fn from_report(report: &Report) -> Self {
        let latency = |ms: Option<u64>| ms.map(|v| i64::try_from(v).unwrap_or(i64::MAX)).unwrap_or(-1);
        Self {
            rssi: report.metrics.signal_strength.unwrap_or(0),
            router_ms: latency(report.metrics.upstream_latency_ms),
            linux_ms: latency(report.metrics.downstream_latency_ms),
            state: report.verdict.code().to_string(),
        }
    }

    /// Encode as the single-line JSON body.
    pub fn encode(&self) -> String {
        // A struct of integers and a short ASCII string cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Metrics;
    use crate::verdict::Verdict;

    fn report(verdict: Verdict, up: Option<u64>, down: Option<u64>, rssi: Option<i32>) -> Report {
        Report {
            verdict,
            metrics: Metrics {
                upstream_latency_ms: up,
                downstream_latency_ms: down,
                signal_strength: rssi,
                recovery_duration_secs: None,
            },
        }
    }

    #[test]
    fn encodes_exact_wire_format() {
        let payload = TelemetryPayload::from_report(&report(Verdict::Healthy, Some(30), Some(20), Some(-52)));
        assert_eq!(
            payload.encode(),
            r#"{"rssi":-52,"router_ms":30,"linux_ms":20,"state":"OK"}"#
        );
    }

    #[test]
    fn missing_values_use_sentinels() {
        let payload = TelemetryPayload::from_report(&report(Verdict::Unreachable, None, None, None));
        assert_eq!(
            payload.encode(),
            r#"{"rssi":0,"router_ms":-1,"linux_ms":-1,"state":"DOWN"}"#
        );
    }

    #[test]
    fn state_codes_follow_verdict() {
        for (verdict, code) in [
            (Verdict::Healthy, "OK"),
            (Verdict::Degraded, "DEG"),
            (Verdict::Unreachable, "DOWN"),
            (Verdict::Recovering, "REC"),
        ] {
            let payload = TelemetryPayload::from_report(&report(verdict, Some(1), Some(2), Some(-40)));
            assert_eq!(payload.state, code);
            assert!(!payload.encode().contains('\n'));
        }
    }
}
