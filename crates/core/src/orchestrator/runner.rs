//! Session orchestrator implementation.
//!
//! Drives rounds until the round limit, a withdrawal, or an abort:
//! - Each round runs under a fresh retry budget
//! - Retryable failures go through the escape procedure
//! - An exhausted budget ends the session (no retry of retries)

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, SessionTask};
use crate::events::{emit, EventHandle, SessionEvent};
use crate::metrics;
use crate::port::{ActionPort, RecognitionPort};
use crate::retry::{AbandonInstance, EscapeAction, NoEscape, RetryBudget, RetryPolicy};
use crate::round::{
    AbortReason, DispelLoop, RoundCounter, RoundError, RoundLoop, RoundPlan, SessionOutcome,
};

use super::config::OrchestratorConfig;
use super::types::{SessionReport, TerminalReason};

/// Top-level driver of one session.
pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    settings: Config,
    recognizer: Arc<dyn RecognitionPort>,
    actions: Arc<dyn ActionPort>,
    escape: Arc<dyn EscapeAction>,
    cancel: CancellationToken,
    events: Option<EventHandle>,
}

impl SessionOrchestrator {
    /// Create an orchestrator for one session.
    ///
    /// The escape procedure is [`AbandonInstance`] when escapes are enabled and
    /// its signatures are configured, [`NoEscape`] otherwise.
    pub fn new(
        config: &Config,
        recognizer: Arc<dyn RecognitionPort>,
        actions: Arc<dyn ActionPort>,
    ) -> Self {
        let escape: Arc<dyn EscapeAction> = if config.escape.enabled {
            match AbandonInstance::from_config(config, recognizer.clone(), actions.clone()) {
                Some(abandon) => Arc::new(abandon),
                None => {
                    warn!(
                        "Escape enabled but abandon/dismiss signatures are missing, \
                         retrying without escape"
                    );
                    Arc::new(NoEscape)
                }
            }
        } else {
            Arc::new(NoEscape)
        };

        Self {
            config: OrchestratorConfig::from(config),
            settings: config.clone(),
            recognizer,
            actions,
            escape,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    /// Use an external token; cancelling it stops the session at the next
    /// polling boundary.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the escape procedure run between failed attempts.
    pub fn with_escape(mut self, escape: Arc<dyn EscapeAction>) -> Self {
        self.escape = escape;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The round shape selected by `session.task`, sharing this session's
    /// cancellation token and event sink.
    fn round_plan(&self) -> Box<dyn RoundPlan> {
        let recognizer = self.recognizer.clone();
        let actions = self.actions.clone();
        match self.settings.session.task {
            SessionTask::Walnut => {
                let mut rounds = RoundLoop::new(&self.settings, recognizer, actions)
                    .with_cancellation(self.cancel.clone());
                if let Some(events) = &self.events {
                    rounds = rounds.with_events(events.clone());
                }
                Box::new(rounds)
            }
            SessionTask::Dispel => {
                let mut rounds = DispelLoop::new(&self.settings, recognizer, actions)
                    .with_cancellation(self.cancel.clone());
                if let Some(events) = &self.events {
                    rounds = rounds.with_events(events.clone());
                }
                Box::new(rounds)
            }
        }
    }

    /// Run the session to its terminal outcome.
    pub async fn run(&self) -> SessionReport {
        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        info!(
            session_id = %session_id,
            round_limit = self.config.round_limit,
            max_attempts = self.config.max_attempts,
            task = %self.settings.session.task.as_str(),
            alternative = %self.settings.session.alternative,
            escape = %self.escape.name(),
            "Starting session"
        );
        emit(
            &self.events,
            SessionEvent::SessionStarted {
                session_id: session_id.clone(),
                round_limit: self.config.round_limit,
                max_attempts: self.config.max_attempts,
                alternative: self.settings.session.alternative.clone(),
            },
        )
        .await;

        let mut counter = RoundCounter::new(self.config.round_limit);
        let terminal = self.drive(&mut counter).await;

        metrics::SESSIONS
            .with_label_values(&[terminal.label()])
            .inc();
        match &terminal {
            TerminalReason::Aborted(reason) => warn!(
                session_id = %session_id,
                rounds_completed = counter.completed(),
                reason = %reason,
                "Session aborted"
            ),
            other => info!(
                session_id = %session_id,
                rounds_completed = counter.completed(),
                terminal = %other,
                "Session finished"
            ),
        }
        emit(
            &self.events,
            SessionEvent::SessionFinished {
                session_id: session_id.clone(),
                rounds_completed: counter.completed(),
                terminal: terminal.to_string(),
            },
        )
        .await;

        SessionReport {
            session_id,
            rounds_completed: counter.completed(),
            terminal,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn drive(&self, counter: &mut RoundCounter) -> TerminalReason {
        let rounds = self.round_plan();
        if let Err(reason) = rounds.preflight() {
            return TerminalReason::Aborted(reason);
        }
        if counter.is_unbounded() {
            info!(task = rounds.name(), "No round limit, running until stopped");
        }

        let mut policy = RetryPolicy::new(self.config.retry_delay());
        if let Some(events) = &self.events {
            policy = policy.with_events(events.clone());
        }

        while counter.has_capacity() {
            if self.cancel.is_cancelled() {
                return TerminalReason::Aborted(RoundError::Cancelled.abort_reason());
            }

            let round = counter.completed() + 1;
            info!(round, limit = counter.limit(), task = rounds.name(), "Starting round");
            emit(&self.events, SessionEvent::RoundStarted { round }).await;

            let started = Instant::now();
            let mut budget = RetryBudget::new(self.config.max_attempts);
            let outcome = {
                let mut run = rounds.start_round(counter);
                match policy
                    .run(&mut budget, run.as_mut(), self.escape.as_ref(), &self.cancel)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => SessionOutcome::Abort(AbortReason::from(e)),
                }
            };
            metrics::ROUND_DURATION
                .with_label_values(&[outcome.label()])
                .observe(started.elapsed().as_secs_f64());

            match outcome {
                SessionOutcome::Abort(reason) => return TerminalReason::Aborted(reason),
                outcome => {
                    emit(
                        &self.events,
                        SessionEvent::RoundCompleted {
                            round,
                            outcome: outcome.label().to_string(),
                        },
                    )
                    .await;
                    match outcome {
                        SessionOutcome::Withdraw => return TerminalReason::Withdrew,
                        SessionOutcome::LimitReached => return TerminalReason::ExhaustedLimit,
                        _ => {}
                    }
                }
            }
        }

        TerminalReason::ExhaustedLimit
    }
}
