//! MQTT transport error types.

use thiserror::Error;

/// Result type alias for MQTT operations.
pub type MqttResult<T> = Result<T, MqttError>;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("broker refused connection: return code {0}")]
    Refused(u8),

    #[error("broker rejected subscription to {0}")]
    SubscribeRejected(String),

    #[error("connection closed by broker")]
    Closed,

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("unexpected packet: expected {expected}, got {got}")]
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
}
