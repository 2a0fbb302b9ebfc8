//! Collector error types.

use thiserror::Error;

pub type CollectorResult<T> = Result<T, CollectorError>;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Mqtt(#[from] netmon_mqtt::MqttError),
}
