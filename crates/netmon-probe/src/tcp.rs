//! TCP connect probe.
//!
//! Measures the time to complete (or be refused) a TCP handshake. A
//! refusal still proves the host is up and answering, so it counts as
//! reachable.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tracing::debug;

use netmon_core::ProbeResult;

use crate::Probe;
use crate::error::{ProbeError, ProbeOutcome};

#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: &str, port: u16, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            port,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            // Bare IPv6 literal.
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl Probe for TcpProbe {
    async fn probe(&self) -> ProbeOutcome {
        let endpoint = self.endpoint();
        let start = Instant::now();

        match tokio::time::timeout(self.timeout, TcpStream::connect(&endpoint)).await {
            Ok(Ok(_stream)) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                debug!(%endpoint, latency_ms, "tcp probe connected");
                Ok(ProbeResult::Reachable { latency_ms })
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                let latency_ms = start.elapsed().as_millis() as u64;
                debug!(%endpoint, latency_ms, "tcp probe refused, host is up");
                Ok(ProbeResult::Reachable { latency_ms })
            }
            Ok(Err(e)) if is_local_fault(e.kind()) => Err(ProbeError::Io(e)),
            Ok(Err(e)) => {
                debug!(%endpoint, error = %e, "tcp probe failed");
                Ok(ProbeResult::Unreachable)
            }
            Err(_) => {
                debug!(%endpoint, "tcp probe timed out");
                Ok(ProbeResult::Unreachable)
            }
        }
    }
}

/// Errors that mean this host cannot probe at all, as opposed to the
/// target not answering.
fn is_local_fault(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::PermissionDenied | ErrorKind::OutOfMemory | ErrorKind::Unsupported
    )
}
