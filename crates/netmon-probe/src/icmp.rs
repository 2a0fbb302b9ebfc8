//! ICMP echo probe via the system `ping` binary.
//!
//! Raw ICMP sockets need elevated privileges; the setuid/capability
//! `ping` already has them, so one echo is delegated to it and the
//! round-trip time is parsed from its output.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use netmon_core::ProbeResult;

use crate::Probe;
use crate::error::{ProbeError, ProbeOutcome};

/// Sends a single echo request to `address`.
#[derive(Debug, Clone)]
pub struct IcmpProbe {
    address: String,
    timeout: Duration,
    program: String,
}

impl IcmpProbe {
    pub fn new(address: &str, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            timeout,
            program: "ping".to_string(),
        }
    }

    /// Use a different ping binary (e.g. a full path).
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    fn args(&self) -> Vec<String> {
        // `-W` takes whole seconds on iputils; the outer timeout enforces the real bound.
        let wait_secs = self.timeout.as_secs_f64().ceil().max(1.0) as u64;
        vec![
            "-n".to_string(),
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            wait_secs.to_string(),
            self.address.clone(),
        ]
    }
}

impl Probe for IcmpProbe {
    async fn probe(&self) -> ProbeOutcome {
        let start = Instant::now();
        let child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(ProbeError::ToolUnavailable(self.program.clone()));
            }
            Ok(Err(e)) => return Err(ProbeError::Io(e)),
            Err(_) => {
                debug!(address = %self.address, "icmp probe timed out");
                return Ok(ProbeResult::Unreachable);
            }
        };

        if !output.status.success() {
            debug!(address = %self.address, status = %output.status, "icmp probe no reply");
            return Ok(ProbeResult::Unreachable);
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let latency_ms = parse_ping_rtt_ms(&String::from_utf8_lossy(&output.stdout)).unwrap_or(elapsed_ms);
        debug!(address = %self.address, latency_ms, "icmp probe reply");
        Ok(ProbeResult::Reachable { latency_ms })
    }
}

/// Extract the round trip from `time=1.23 ms` (Linux and macOS formats),
/// rounded to the nearest millisecond.
pub fn parse_ping_rtt_ms(output: &str) -> Option<u64> {
    let start = output.find("time=")?;
    let rest = &output[start + 5..];
    let end = rest.find(|c: char| c != '.' && !c.is_ascii_digit())?;
    let ms = rest[..end].parse::<f64>().ok()?;
    Some(ms.round() as u64)
}
