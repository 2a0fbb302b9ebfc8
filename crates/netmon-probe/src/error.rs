//! Probe error types.
//!
//! Ordinary unreachability is not an error; it is reported as
//! [`ProbeResult::Unreachable`](netmon_core::ProbeResult::Unreachable).
//! These variants cover faults that make probing impossible.

use thiserror::Error;

/// Result type alias for probe attempts.
pub type ProbeOutcome = Result<netmon_core::ProbeResult, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("invalid probe target: {0}")]
    InvalidTarget(String),

    #[error("probe i/o error: {0}")]
    Io(#[from] std::io::Error),
}
