//! netmon-probe: reachability and latency probes.
//!
//! Each probe performs exactly one attempt, bounded by its timeout, and
//! reports a [`ProbeResult`]. No retries happen here; failure accounting
//! across attempts belongs to the target history in `netmon-core`.
//!
//! # Probes
//!
//! | Method | Type | Success means |
//! |---|---|---|
//! | `icmp` | [`IcmpProbe`] | one echo reply from the system `ping` |
//! | `tcp` | [`TcpProbe`] | handshake completed or actively refused |

pub mod error;
pub mod icmp;
pub mod tcp;

use std::future::Future;

use netmon_core::{ProbeMethod, ProbeResult, TargetConfig};

pub use error::{ProbeError, ProbeOutcome};
pub use icmp::IcmpProbe;
pub use tcp::TcpProbe;

/// A single bounded reachability measurement.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self) -> impl Future<Output = ProbeOutcome> + Send;
}

/// The probe configured for one target.
#[derive(Debug, Clone)]
pub enum TargetProbe {
    Icmp(IcmpProbe),
    Tcp(TcpProbe),
}

impl TargetProbe {
    pub fn from_config(config: &TargetConfig) -> Self {
        match config.method {
            ProbeMethod::Icmp => TargetProbe::Icmp(IcmpProbe::new(&config.address, config.timeout)),
            ProbeMethod::Tcp => {
                TargetProbe::Tcp(TcpProbe::new(&config.address, config.port, config.timeout))
            }
        }
    }
}

impl Probe for TargetProbe {
    async fn probe(&self) -> ProbeOutcome {
        match self {
            TargetProbe::Icmp(p) => p.probe().await,
            TargetProbe::Tcp(p) => p.probe().await,
        }
    }
}

/// Collapse a probe fault into a failed measurement for the history,
/// keeping the fault for the caller to log.
pub fn outcome_to_result(outcome: &ProbeOutcome) -> ProbeResult {
    match outcome {
        Ok(result) => *result,
        Err(_) => ProbeResult::Unreachable,
    }
}
