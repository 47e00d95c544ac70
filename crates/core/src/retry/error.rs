//! Error types for the retry policy.

use thiserror::Error;

use crate::port::PortError;

/// A failure the retry policy can classify.
pub trait Failure: std::error::Error + Send {
    /// Whether another attempt may succeed.
    fn is_retryable(&self) -> bool;

    /// Name of the stage that failed.
    fn stage(&self) -> &str;

    /// Short snake_case label used for metrics.
    fn kind(&self) -> &'static str;
}

/// Errors surfaced by [`super::RetryPolicy::run`].
#[derive(Debug, Error)]
pub enum RetryError<E: Failure> {
    /// Every attempt in the budget failed.
    #[error("retry budget exhausted at stage '{stage}' after {attempts} attempts: {last}")]
    Exhausted { stage: String, attempts: u32, last: E },

    /// A failure no retry can fix.
    #[error(transparent)]
    Fatal(E),

    /// Cancelled while waiting between attempts.
    #[error("cancelled between attempts")]
    Cancelled,
}

/// Errors from an escape procedure. Logged, never fatal to the retry loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EscapeError {
    #[error("escape step '{step}' did not find '{signature}'")]
    SignalTimeout { step: String, signature: String },

    #[error("escape step '{step}' failed: {source}")]
    Port {
        step: String,
        #[source]
        source: PortError,
    },

    #[error("escape cancelled")]
    Cancelled,
}
