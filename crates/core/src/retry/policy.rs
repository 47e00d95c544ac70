//! Bounded retry loop with an escape procedure between attempts.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::budget::RetryBudget;
use super::error::{EscapeError, Failure, RetryError};
use super::escape::EscapeAction;
use crate::events::{emit, EventHandle, SessionEvent};
use crate::metrics;
use crate::stage::pause;

/// A unit of work the retry policy may run more than once.
///
/// Implementations keep their own progress, so a later attempt can resume
/// where the previous one failed instead of starting over.
#[async_trait]
pub trait Attempt: Send {
    type Output: Send;
    type Error: Failure;

    async fn attempt(&mut self) -> Result<Self::Output, Self::Error>;
}

/// Runs attempts against a [`RetryBudget`].
///
/// Every retryable failure consumes one attempt and is followed by the escape
/// procedure, including the last one. The fixed delay only separates attempts
/// that will actually run.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delay: Duration,
    events: Option<EventHandle>,
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn run<A: Attempt + ?Sized>(
        &self,
        budget: &mut RetryBudget,
        attempt: &mut A,
        escape: &dyn EscapeAction,
        cancel: &CancellationToken,
    ) -> Result<A::Output, RetryError<A::Error>> {
        loop {
            let error = match attempt.attempt().await {
                Ok(output) => return Ok(output),
                Err(e) => e,
            };

            metrics::STAGE_FAILURES
                .with_label_values(&[error.stage(), error.kind()])
                .inc();

            if !error.is_retryable() {
                emit(
                    &self.events,
                    SessionEvent::StageFailed {
                        stage: error.stage().to_string(),
                        attempt: budget.attempts_used() + 1,
                        reason: error.to_string(),
                        retryable: false,
                    },
                )
                .await;
                return Err(RetryError::Fatal(error));
            }

            budget.consume();
            let used = budget.attempts_used();
            warn!(
                stage = %error.stage(),
                attempt = used,
                max_attempts = budget.max_attempts(),
                error = %error,
                "Attempt failed"
            );
            emit(
                &self.events,
                SessionEvent::StageFailed {
                    stage: error.stage().to_string(),
                    attempt: used,
                    reason: error.to_string(),
                    retryable: true,
                },
            )
            .await;

            if !self.run_escape(escape, used, cancel).await {
                return Err(RetryError::Cancelled);
            }

            if budget.is_exhausted() {
                return Err(RetryError::Exhausted {
                    stage: error.stage().to_string(),
                    attempts: used,
                    last: error,
                });
            }

            if !pause(self.delay, cancel).await {
                return Err(RetryError::Cancelled);
            }
            info!(
                stage = %error.stage(),
                remaining = budget.remaining(),
                "Retrying"
            );
        }
    }

    /// Runs the escape procedure. Returns false only when it was cancelled.
    async fn run_escape(
        &self,
        escape: &dyn EscapeAction,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> bool {
        let result = escape.escape(cancel).await;
        let (succeeded, detail) = match &result {
            Ok(()) => (true, None),
            Err(e) => {
                warn!(escape = %escape.name(), attempt, error = %e, "Escape procedure failed");
                (false, Some(e.to_string()))
            }
        };

        metrics::ESCAPE_INVOCATIONS
            .with_label_values(&[if succeeded { "succeeded" } else { "failed" }])
            .inc();
        emit(
            &self.events,
            SessionEvent::EscapeInvoked {
                attempt,
                succeeded,
                detail,
            },
        )
        .await;

        !matches!(result, Err(EscapeError::Cancelled))
    }
}
