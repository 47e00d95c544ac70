//! Stage helpers shared by every round shape.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::RoundError;
use crate::events::{emit, EventHandle, SessionEvent};
use crate::port::{press_key, ActionPort, RecognitionPort};
use crate::stage::{pause, Matched, Stage, StageResult};

/// Host ports plus the session's cancellation token and event sink.
pub(crate) struct StageDriver {
    pub(crate) recognizer: Arc<dyn RecognitionPort>,
    pub(crate) actions: Arc<dyn ActionPort>,
    pub(crate) cancel: CancellationToken,
    pub(crate) events: Option<EventHandle>,
}

impl StageDriver {
    pub(crate) fn new(recognizer: Arc<dyn RecognitionPort>, actions: Arc<dyn ActionPort>) -> Self {
        Self {
            recognizer,
            actions,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Evaluates `stage`, mapping everything but a match to an error.
    pub(crate) async fn find(
        &self,
        stage: &Stage,
        missing: impl FnOnce() -> RoundError + Send,
    ) -> Result<Matched, RoundError> {
        match stage.evaluate(self.recognizer.as_ref(), &self.cancel).await {
            StageResult::Matched(matched) => {
                debug!(stage = %stage.name(), candidate = %matched.candidate, "Stage matched");
                emit(
                    &self.events,
                    SessionEvent::StageMatched {
                        stage: stage.name().to_string(),
                        candidate: matched.candidate.clone(),
                    },
                )
                .await;
                Ok(matched)
            }
            StageResult::NotFound => Err(missing()),
            StageResult::Error { reason } => Err(RoundError::PortFault {
                stage: stage.name().to_string(),
                reason,
            }),
            StageResult::Cancelled => Err(RoundError::Cancelled),
        }
    }

    /// Single probe without waiting. `None` when nothing is visible.
    pub(crate) async fn peek(&self, stage: &Stage) -> Result<Option<Matched>, RoundError> {
        if self.cancel.is_cancelled() {
            return Err(RoundError::Cancelled);
        }
        match stage.probe(self.recognizer.as_ref()).await {
            StageResult::Matched(matched) => Ok(Some(matched)),
            StageResult::NotFound => Ok(None),
            StageResult::Error { reason } => Err(RoundError::PortFault {
                stage: stage.name().to_string(),
                reason,
            }),
            StageResult::Cancelled => Err(RoundError::Cancelled),
        }
    }

    pub(crate) async fn click(&self, stage: &Stage, matched: &Matched) -> Result<(), RoundError> {
        stage
            .act(self.actions.as_ref(), matched)
            .await
            .map_err(|e| RoundError::from_port(stage.name(), e))
    }

    pub(crate) async fn find_and_click(
        &self,
        stage: &Stage,
        missing: impl FnOnce() -> RoundError + Send,
    ) -> Result<(), RoundError> {
        let matched = self.find(stage, missing).await?;
        self.click(stage, &matched).await
    }

    pub(crate) async fn press(
        &self,
        stage: &str,
        key: &str,
        hold: Duration,
    ) -> Result<(), RoundError> {
        if self.cancel.is_cancelled() {
            return Err(RoundError::Cancelled);
        }
        press_key(self.actions.as_ref(), key, hold)
            .await
            .map_err(|e| RoundError::from_port(stage, e))
    }

    /// Cancellable delay.
    pub(crate) async fn wait(&self, duration: Duration) -> Result<(), RoundError> {
        if pause(duration, &self.cancel).await {
            Ok(())
        } else {
            Err(RoundError::Cancelled)
        }
    }
}
