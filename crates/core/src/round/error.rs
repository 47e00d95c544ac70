use thiserror::Error;

use super::types::{AbortKind, AbortReason};
use crate::port::PortError;
use crate::retry::{Failure, RetryError};

/// Errors raised while driving a round.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoundError {
    /// A signature never appeared within its window. Retryable.
    #[error("stage '{stage}' timed out waiting for '{signature}'")]
    SignalTimeout { stage: String, signature: String },

    /// Injected input did not take effect. Retryable.
    #[error("stage '{stage}' action failed: {reason}")]
    ActionFailure { stage: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A step that has no retry path failed.
    #[error("stage '{stage}' aborted: {reason}")]
    Aborted { stage: String, reason: String },

    #[error("host fault at stage '{stage}': {reason}")]
    PortFault { stage: String, reason: String },

    #[error("session cancelled")]
    Cancelled,
}

impl RoundError {
    /// Maps a port error raised while acting on `stage`.
    pub(crate) fn from_port(stage: &str, error: PortError) -> Self {
        if error.is_retryable() {
            Self::ActionFailure {
                stage: stage.to_string(),
                reason: error.to_string(),
            }
        } else {
            Self::PortFault {
                stage: stage.to_string(),
                reason: error.to_string(),
            }
        }
    }

    pub fn abort_reason(&self) -> AbortReason {
        match self {
            Self::SignalTimeout { stage, signature } => AbortReason::new(
                AbortKind::SignalTimeout,
                stage,
                format!("'{}' did not appear", signature),
            ),
            Self::ActionFailure { stage, reason } => {
                AbortReason::new(AbortKind::ActionFailure, stage, reason)
            }
            Self::Configuration(detail) => {
                AbortReason::new(AbortKind::Configuration, "configuration", detail)
            }
            Self::Aborted { stage, reason } => {
                AbortReason::new(AbortKind::SignalTimeout, stage, reason)
            }
            Self::PortFault { stage, reason } => {
                AbortReason::new(AbortKind::PortFault, stage, reason)
            }
            Self::Cancelled => AbortReason::new(AbortKind::Cancelled, "session", "cancelled"),
        }
    }
}

impl Failure for RoundError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::SignalTimeout { .. } | Self::ActionFailure { .. })
    }

    fn stage(&self) -> &str {
        match self {
            Self::SignalTimeout { stage, .. }
            | Self::ActionFailure { stage, .. }
            | Self::Aborted { stage, .. }
            | Self::PortFault { stage, .. } => stage,
            Self::Configuration(_) => "configuration",
            Self::Cancelled => "session",
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::SignalTimeout { .. } => "signal_timeout",
            Self::ActionFailure { .. } => "action_failure",
            Self::Configuration(_) => "configuration",
            Self::Aborted { .. } => "aborted",
            Self::PortFault { .. } => "port_fault",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<RetryError<RoundError>> for AbortReason {
    fn from(error: RetryError<RoundError>) -> Self {
        match error {
            RetryError::Exhausted {
                stage,
                attempts,
                last,
            } => AbortReason::new(
                AbortKind::RetryExhausted,
                stage,
                format!("{} attempts failed, last: {}", attempts, last),
            ),
            RetryError::Fatal(e) => e.abort_reason(),
            RetryError::Cancelled => RoundError::Cancelled.abort_reason(),
        }
    }
}
