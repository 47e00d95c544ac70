//! Error types for the host ports.

use thiserror::Error;

/// Errors reported by a recognition or action host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// The host itself failed (capture device lost, OCR engine crashed).
    #[error("host fault: {0}")]
    Fault(String),

    /// The injected input was not accepted by the target.
    #[error("input rejected: {0}")]
    InputRejected(String),

    /// The game window could not be brought to the foreground.
    #[error("window not in foreground")]
    NotForeground,
}

impl PortError {
    /// Whether the round can recover from this error through the escape path.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InputRejected(_) | Self::NotForeground)
    }
}
