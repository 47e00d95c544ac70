//! The stage sequence of one walnut round.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::driver::StageDriver;
use super::error::RoundError;
use super::plan::{RoundAttempt, RoundPlan};
use super::types::{AbortKind, AbortReason, RoundCounter, RoundPhase, SessionOutcome};
use crate::config::{BranchPolicy, Config};
use crate::events::EventHandle;
use crate::metrics;
use crate::port::{ActionPort, RecognitionPort};
use crate::retry::Attempt;
use crate::signature::Signature;
use crate::stage::{Stage, StageResult};

const ROUND_START: &str = "round-start";
const CONFIRM: &str = "confirm-selection";
const BRANCH: &str = "branch-choice";
const SELECTION_SCREEN: &str = "selection-screen";
const SELECT_ALTERNATIVE: &str = "select-alternative";
const SELECTION_CONFIRM: &str = "selection-confirm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Withdraw,
    Continue,
}

/// Drives the stages of a walnut round against the host ports.
///
/// Stages are built once from configuration; each round is a fresh
/// [`RoundRun`] over them.
pub struct RoundLoop {
    driver: StageDriver,
    policy: BranchPolicy,
    round_start: Stage,
    confirm: Stage,
    withdraw: Signature,
    proceed: Signature,
    branch_timeout: Duration,
    poll_interval: Duration,
    action_delay: Duration,
    selection_screen: Option<Stage>,
    alternative_name: String,
    alternative: Option<Stage>,
    selection_confirm: Stage,
}

impl RoundLoop {
    pub fn new(
        config: &Config,
        recognizer: Arc<dyn RecognitionPort>,
        actions: Arc<dyn ActionPort>,
    ) -> Self {
        let timing = &config.timing;
        let table = &config.signatures;
        let clickable = |name: &str, signature: Signature| {
            Stage::single(name, signature)
                .with_timeout(timing.stage_timeout())
                .with_poll_interval(timing.poll_interval())
                .with_settle(timing.action_delay())
        };

        Self {
            driver: StageDriver::new(recognizer, actions),
            policy: config.session.branch_policy,
            round_start: Stage::single(ROUND_START, table.round_start.clone())
                .with_timeout(timing.primary_timeout())
                .with_poll_interval(timing.primary_poll_interval()),
            confirm: clickable(CONFIRM, table.confirm.clone()),
            withdraw: table.withdraw.clone(),
            proceed: table.proceed.clone(),
            branch_timeout: timing.stage_timeout(),
            poll_interval: timing.poll_interval(),
            action_delay: timing.action_delay(),
            selection_screen: table.selection_screen.clone().map(|sig| {
                Stage::single(SELECTION_SCREEN, sig)
                    .with_timeout(timing.stage_timeout())
                    .with_poll_interval(timing.poll_interval())
            }),
            alternative_name: config.session.alternative.clone(),
            alternative: config
                .selected_alternative()
                .cloned()
                .map(|sig| clickable(SELECT_ALTERNATIVE, sig)),
            selection_confirm: clickable(SELECTION_CONFIRM, table.confirm.clone()),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.driver.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.driver.events = Some(events);
        self
    }

    /// Starts a round. The returned run can be attempted repeatedly; each
    /// attempt resumes at the phase where the previous one failed.
    pub fn start<'a>(&'a self, counter: &'a mut RoundCounter) -> RoundRun<'a> {
        let prefer_withdraw = match self.policy {
            BranchPolicy::Continue => false,
            BranchPolicy::Withdraw => true,
            BranchPolicy::WithdrawAtLimit => counter.is_last_round(),
        };
        RoundRun {
            round: self,
            counter,
            phase: RoundPhase::AwaitingPrimary,
            prefer_withdraw,
            finished: None,
        }
    }

    /// Runs one round with a single attempt. Every failure becomes an `Abort`.
    pub async fn run_round(&self, counter: &mut RoundCounter) -> SessionOutcome {
        let mut run = self.start(counter);
        match run.attempt().await {
            Ok(outcome) => outcome,
            Err(e) => SessionOutcome::Abort(e.abort_reason()),
        }
    }

    fn branch_stage(&self, prefer_withdraw: bool) -> Stage {
        let candidates = if prefer_withdraw {
            vec![self.withdraw.clone(), self.proceed.clone()]
        } else {
            vec![self.proceed.clone(), self.withdraw.clone()]
        };
        Stage::new(BRANCH, candidates)
            .with_timeout(self.branch_timeout)
            .with_poll_interval(self.poll_interval)
            .with_settle(self.action_delay)
    }

    async fn await_primary(&self) -> Result<(), RoundError> {
        info!(
            timeout_s = self.round_start.timeout().as_secs(),
            "Waiting for round start"
        );
        self.driver
            .find(&self.round_start, || RoundError::Aborted {
                stage: ROUND_START.to_string(),
                reason: "primary signal timeout".to_string(),
            })
            .await
            .map(|_| ())
    }

    async fn confirm_reward(&self) -> Result<(), RoundError> {
        self.driver
            .find_and_click(&self.confirm, || RoundError::Aborted {
                stage: CONFIRM.to_string(),
                reason: "confirmation not found".to_string(),
            })
            .await
    }

    async fn choose_branch(&self, prefer_withdraw: bool) -> Result<Branch, RoundError> {
        let stage = self.branch_stage(prefer_withdraw);
        let (preferred, branch) = if prefer_withdraw {
            (&self.withdraw, Branch::Withdraw)
        } else {
            (&self.proceed, Branch::Continue)
        };
        let deadline = Instant::now() + self.branch_timeout;

        let seen = self
            .driver
            .find(&stage, || RoundError::SignalTimeout {
                stage: BRANCH.to_string(),
                signature: format!("{} or {}", self.withdraw.id, self.proceed.id),
            })
            .await?;

        let matched = if seen.candidate == preferred.id {
            seen
        } else {
            // The buttons may render apart; the branch window still applies.
            debug!(
                seen = %seen.candidate,
                wanted = %preferred.id,
                "Waiting for the preferred branch"
            );
            let rest = Stage::single(BRANCH, preferred.clone())
                .with_timeout(deadline.saturating_duration_since(Instant::now()))
                .with_poll_interval(self.poll_interval);
            self.driver
                .find(&rest, || RoundError::SignalTimeout {
                    stage: BRANCH.to_string(),
                    signature: preferred.id.clone(),
                })
                .await?
        };

        info!(choice = %matched.candidate, "Branch chosen");
        self.driver.click(&stage, &matched).await?;
        Ok(branch)
    }

    async fn sub_select(&self) -> Result<(), RoundError> {
        if let Some(screen) = &self.selection_screen {
            let driver = &self.driver;
            match screen.evaluate(driver.recognizer.as_ref(), &driver.cancel).await {
                StageResult::Matched(_) => debug!("Selection screen loaded"),
                StageResult::NotFound => {
                    warn!("Selection screen not confirmed, trying the selection anyway")
                }
                StageResult::Error { reason } => {
                    return Err(RoundError::PortFault {
                        stage: SELECTION_SCREEN.to_string(),
                        reason,
                    })
                }
                StageResult::Cancelled => return Err(RoundError::Cancelled),
            }
        }

        let Some(target) = &self.alternative else {
            return Err(RoundError::Configuration(format!(
                "alternative '{}' has no target signature",
                self.alternative_name
            )));
        };

        let name = &self.alternative_name;
        self.driver
            .find_and_click(target, || RoundError::Aborted {
                stage: SELECT_ALTERNATIVE.to_string(),
                reason: format!("alternative '{}' not found", name),
            })
            .await?;

        self.driver
            .find_and_click(&self.selection_confirm, || RoundError::Aborted {
                stage: SELECTION_CONFIRM.to_string(),
                reason: "confirmation not found".to_string(),
            })
            .await
    }
}

impl RoundPlan for RoundLoop {
    fn name(&self) -> &'static str {
        "walnut"
    }

    fn preflight(&self) -> Result<(), AbortReason> {
        if self.alternative.is_some() {
            return Ok(());
        }
        Err(AbortReason::new(
            AbortKind::Configuration,
            "preflight",
            format!(
                "alternative '{}' has no target signature",
                self.alternative_name
            ),
        ))
    }

    fn start_round<'a>(&'a self, counter: &'a mut RoundCounter) -> RoundAttempt<'a> {
        Box::new(self.start(counter))
    }
}

/// One round in progress.
pub struct RoundRun<'a> {
    round: &'a RoundLoop,
    counter: &'a mut RoundCounter,
    phase: RoundPhase,
    prefer_withdraw: bool,
    finished: Option<SessionOutcome>,
}

impl RoundRun<'_> {
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    fn complete(&mut self, outcome: SessionOutcome) -> SessionOutcome {
        self.phase = RoundPhase::Complete;
        self.finished = Some(outcome.clone());
        outcome
    }
}

/// Counts a finished round on `counter` and in the metrics.
pub(crate) fn record_round(counter: &mut RoundCounter) {
    counter.record();
    metrics::ROUNDS_COMPLETED.inc();
    info!(
        completed = counter.completed(),
        limit = counter.limit(),
        "Round completed"
    );
}

#[async_trait]
impl Attempt for RoundRun<'_> {
    type Output = SessionOutcome;
    type Error = RoundError;

    async fn attempt(&mut self) -> Result<SessionOutcome, RoundError> {
        if let Some(outcome) = &self.finished {
            return Ok(outcome.clone());
        }
        let round = self.round;

        if self.phase == RoundPhase::AwaitingPrimary {
            round.await_primary().await?;
            self.phase = RoundPhase::Confirming;
        }

        if self.phase == RoundPhase::Confirming {
            round.confirm_reward().await?;
            self.phase = RoundPhase::BranchChoice;
        }

        if self.phase == RoundPhase::BranchChoice {
            match round.choose_branch(self.prefer_withdraw).await? {
                Branch::Withdraw => {
                    // The reward is already confirmed, so the round counts.
                    record_round(self.counter);
                    return Ok(self.complete(SessionOutcome::Withdraw));
                }
                Branch::Continue => self.phase = RoundPhase::SubSelection,
            }
        }

        round.sub_select().await?;
        record_round(self.counter);
        let outcome = if self.counter.is_exhausted() {
            SessionOutcome::LimitReached
        } else {
            SessionOutcome::Continue
        };
        Ok(self.complete(outcome))
    }
}
