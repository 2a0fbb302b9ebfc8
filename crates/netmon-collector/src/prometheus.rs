//! Prometheus text exposition format.
//!
//! One gauge family per payload field, labelled by device, plus ingest
//! counters. Missing or `-1` latencies are left out so that a failed
//! probe does not show up as a sample.

use std::fmt::Write;

use crate::record::MetricRecord;

/// Every verdict code a device can publish.
const STATES: [&str; 4] = ["OK", "DEG", "DOWN", "REC"];

/// Render the latest record per device and the ingest counters.
pub fn render_prometheus(latest: &[MetricRecord], messages: u64, rejected: u64) -> String {
    let mut out = String::new();

    out.push_str("# HELP netmon_rssi_dbm Last reported signal strength in dBm.\n");
    out.push_str("# TYPE netmon_rssi_dbm gauge\n");
    for r in latest {
        if let Some(rssi) = r.rssi {
            let _ = writeln!(out, "netmon_rssi_dbm{{device=\"{}\"}} {rssi}", escape(&r.device));
        }
    }

    out.push_str("# HELP netmon_router_latency_ms Last upstream round trip in milliseconds.\n");
    out.push_str("# TYPE netmon_router_latency_ms gauge\n");
    for r in latest {
        if let Some(ms) = r.router_ms.filter(|v| *v >= 0) {
            let _ = writeln!(out, "netmon_router_latency_ms{{device=\"{}\"}} {ms}", escape(&r.device));
        }
    }

    out.push_str("# HELP netmon_linux_latency_ms Last downstream round trip in milliseconds.\n");
    out.push_str("# TYPE netmon_linux_latency_ms gauge\n");
    for r in latest {
        if let Some(ms) = r.linux_ms.filter(|v| *v >= 0) {
            let _ = writeln!(out, "netmon_linux_latency_ms{{device=\"{}\"}} {ms}", escape(&r.device));
        }
    }

    out.push_str("# HELP netmon_state Current verdict, 1 for the active state.\n");
    out.push_str("# TYPE netmon_state gauge\n");
    for r in latest {
        for state in STATES {
            let active = u8::from(r.state.as_deref() == Some(state));
            let _ = writeln!(
                out,
                "netmon_state{{device=\"{}\",state=\"{state}\"}} {active}",
                escape(&r.device)
            );
        }
    }

    out.push_str("# HELP netmon_messages_total Messages received from the broker.\n");
    out.push_str("# TYPE netmon_messages_total counter\n");
    let _ = writeln!(out, "netmon_messages_total {messages}");

    out.push_str("# HELP netmon_rejected_total Messages that were not JSON objects.\n");
    out.push_str("# TYPE netmon_rejected_total counter\n");
    let _ = writeln!(out, "netmon_rejected_total {rejected}");

    out
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
