//! The dispel round: start a challenge, wait for the map, cast, replay.
//!
//! There is no reward screen or branch here. A round is one start-to-replay
//! cycle, and a missing replay button goes through the same retry and escape
//! path as a missing walnut signal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::driver::StageDriver;
use super::error::RoundError;
use super::plan::{RoundAttempt, RoundPlan};
use super::round_loop::record_round;
use super::types::{RoundCounter, SessionOutcome};
use crate::config::Config;
use crate::events::EventHandle;
use crate::port::{ActionPort, RecognitionPort};
use crate::retry::Attempt;
use crate::signature::Region;
use crate::stage::Stage;

const PREPARE: &str = "prepare";
const START: &str = "start-challenge";
const MAP_LOADED: &str = "map-loaded";
const CAST: &str = "cast-skill";
const REPLAY: &str = "replay";

/// Where a dispel round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispelPhase {
    /// First round only: wait, then clear a leftover confirmation.
    Preparing,
    Starting,
    AwaitingMap,
    Casting,
    AwaitingReplay,
    Complete,
}

/// Drives dispel rounds against the host ports.
pub struct DispelLoop {
    driver: StageDriver,
    prepare: Duration,
    leftover_confirm: Stage,
    start: Stage,
    map_loaded: Stage,
    map_settle: Duration,
    skill_key: String,
    skill_presses: u32,
    skill_interval: Duration,
    key_hold: Duration,
    replay: Stage,
    replay_id: String,
}

impl DispelLoop {
    pub fn new(
        config: &Config,
        recognizer: Arc<dyn RecognitionPort>,
        actions: Arc<dyn ActionPort>,
    ) -> Self {
        let timing = &config.timing;
        let dispel = &config.dispel;

        Self {
            driver: StageDriver::new(recognizer, actions),
            prepare: dispel.prepare(),
            leftover_confirm: Stage::single(PREPARE, config.signatures.confirm.clone())
                .within(Region::bottom_right())
                .with_settle(timing.action_delay()),
            start: Stage::single(START, dispel.start.clone())
                .with_timeout(timing.stage_timeout())
                .with_poll_interval(timing.poll_interval())
                .with_settle(timing.action_delay()),
            map_loaded: Stage::single(MAP_LOADED, dispel.map_loaded.clone())
                .with_timeout(timing.stage_timeout())
                .with_poll_interval(timing.poll_interval()),
            map_settle: dispel.map_settle(),
            skill_key: dispel.skill_key.clone(),
            skill_presses: dispel.skill_presses,
            skill_interval: dispel.skill_interval(),
            key_hold: timing.key_hold(),
            replay: Stage::single(REPLAY, dispel.replay.clone())
                .with_timeout(dispel.replay_timeout())
                .with_poll_interval(dispel.replay_poll_interval())
                .with_settle(timing.action_delay()),
            replay_id: dispel.replay.id.clone(),
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

    /// Starts a round. Only the session's first round prepares.
    pub fn start<'a>(&'a self, counter: &'a mut RoundCounter) -> DispelRun<'a> {
        let phase = if counter.completed() == 0 {
            DispelPhase::Preparing
        } else {
            DispelPhase::Starting
        };
        DispelRun {
            round: self,
            counter,
            phase,
            finished: None,
        }
    }

    async fn prepare(&self) -> Result<(), RoundError> {
        info!(delay_ms = self.prepare.as_millis() as u64, "Preparing dispel session");
        self.driver.wait(self.prepare).await?;
        if let Some(matched) = self.driver.peek(&self.leftover_confirm).await? {
            debug!("Clearing leftover confirmation");
            self.driver.click(&self.leftover_confirm, &matched).await?;
        }
        Ok(())
    }

    async fn start_challenge(&self) -> Result<(), RoundError> {
        self.driver
            .find_and_click(&self.start, || RoundError::Aborted {
                stage: START.to_string(),
                reason: "start button not found".to_string(),
            })
            .await
    }

    async fn await_map(&self) -> Result<(), RoundError> {
        self.driver
            .find(&self.map_loaded, || RoundError::Aborted {
                stage: MAP_LOADED.to_string(),
                reason: "map did not load".to_string(),
            })
            .await?;
        self.driver.wait(self.map_settle).await
    }

    async fn cast(&self) -> Result<(), RoundError> {
        for press in 1..=self.skill_presses {
            debug!(key = %self.skill_key, press, "Casting");
            self.driver.press(CAST, &self.skill_key, self.key_hold).await?;
            self.driver.wait(self.skill_interval).await?;
        }
        Ok(())
    }

    async fn replay(&self) -> Result<(), RoundError> {
        info!(
            timeout_s = self.replay.timeout().as_secs(),
            "Waiting for the run to finish"
        );
        self.driver
            .find_and_click(&self.replay, || RoundError::SignalTimeout {
                stage: REPLAY.to_string(),
                signature: self.replay_id.clone(),
            })
            .await
    }
}

impl RoundPlan for DispelLoop {
    fn name(&self) -> &'static str {
        "dispel"
    }

    fn start_round<'a>(&'a self, counter: &'a mut RoundCounter) -> RoundAttempt<'a> {
        Box::new(self.start(counter))
    }
}

/// One dispel round in progress.
pub struct DispelRun<'a> {
    round: &'a DispelLoop,
    counter: &'a mut RoundCounter,
    phase: DispelPhase,
    finished: Option<SessionOutcome>,
}

impl DispelRun<'_> {
    pub fn phase(&self) -> DispelPhase {
        self.phase
    }
}

#[async_trait]
impl Attempt for DispelRun<'_> {
    type Output = SessionOutcome;
    type Error = RoundError;

    async fn attempt(&mut self) -> Result<SessionOutcome, RoundError> {
        if let Some(outcome) = &self.finished {
            return Ok(outcome.clone());
        }
        let round = self.round;

        if self.phase == DispelPhase::Preparing {
            round.prepare().await?;
            self.phase = DispelPhase::Starting;
        }

        if self.phase == DispelPhase::Starting {
            round.start_challenge().await?;
            self.phase = DispelPhase::AwaitingMap;
        }

        if self.phase == DispelPhase::AwaitingMap {
            round.await_map().await?;
            self.phase = DispelPhase::Casting;
        }

        if self.phase == DispelPhase::Casting {
            round.cast().await?;
            self.phase = DispelPhase::AwaitingReplay;
        }

        round.replay().await?;
        record_round(self.counter);
        let outcome = if self.counter.is_exhausted() {
            SessionOutcome::LimitReached
        } else {
            SessionOutcome::Continue
        };
        self.phase = DispelPhase::Complete;
        self.finished = Some(outcome.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Failure;
    use crate::round::AbortKind;
    use crate::simulation::{Reaction, SceneElement, SimulatedScreen};
    use crate::testing::fixtures;
    use tokio::time::Instant;

    fn dispel_loop(config: &Config, sim: &Arc<SimulatedScreen>) -> DispelLoop {
        DispelLoop::new(config, sim.clone(), sim.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_round_prepares_and_replays() {
        let sim = Arc::new(fixtures::dispel_screen());
        let config = fixtures::dispel_config();
        let round = dispel_loop(&config, &sim);
        let mut counter = RoundCounter::new(0);

        let started = Instant::now();
        let outcome = round.start(&mut counter).attempt().await.unwrap();

        assert_eq!(outcome, SessionOutcome::Continue);
        assert_eq!(counter.completed(), 1);
        assert_eq!(sim.clicks_on("确认选择"), 1);
        assert_eq!(sim.clicks_on("开始挑战"), 1);
        assert_eq!(sim.clicks_on("再次进行"), 1);
        let keys: Vec<String> = sim.keys().into_iter().map(|k| k.key).collect();
        assert_eq!(keys, vec!["4", "4", "4"]);
        // The first round cannot finish before the preparation wait.
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_rounds_skip_preparation() {
        let sim = Arc::new(fixtures::dispel_screen());
        let config = fixtures::dispel_config();
        let round = dispel_loop(&config, &sim);
        let mut counter = RoundCounter::new(3);

        assert_eq!(
            round.start(&mut counter).attempt().await.unwrap(),
            SessionOutcome::Continue
        );
        let run = round.start(&mut counter);
        assert_eq!(run.phase(), DispelPhase::Starting);
        drop(run);

        assert_eq!(
            round.start(&mut counter).attempt().await.unwrap(),
            SessionOutcome::Continue
        );
        assert_eq!(
            round.start(&mut counter).attempt().await.unwrap(),
            SessionOutcome::LimitReached
        );
        assert_eq!(sim.clicks_on("确认选择"), 1);
        assert_eq!(sim.clicks_on("再次进行"), 3);
        assert_eq!(sim.keys().len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_leftover_confirmation_is_fine() {
        let sim = Arc::new(fixtures::dispel_screen());
        sim.hide("确认选择");
        let config = fixtures::dispel_config();
        let round = dispel_loop(&config, &sim);
        let mut counter = RoundCounter::new(1);

        assert_eq!(
            round.start(&mut counter).attempt().await.unwrap(),
            SessionOutcome::LimitReached
        );
        assert_eq!(sim.clicks_on("确认选择"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_marker_outside_region_is_not_a_loaded_map() {
        let sim = Arc::new(fixtures::dispel_screen());
        // The left half is outside the marker's top-right region.
        sim.add_reaction(
            Reaction::on_click("开始挑战")
                .hiding(["驱离"])
                .showing(
                    SceneElement::text("驱离", fixtures::LETTER).appearing_after(2000),
                ),
        );
        let config = fixtures::dispel_config();
        let round = dispel_loop(&config, &sim);
        let mut counter = RoundCounter::new(0);
        let mut run = round.start(&mut counter);

        let err = run.attempt().await.unwrap_err();
        assert_eq!(
            err,
            RoundError::Aborted {
                stage: "map-loaded".to_string(),
                reason: "map did not load".to_string(),
            }
        );
        assert!(!err.is_retryable());
        assert_eq!(err.abort_reason().kind, AbortKind::SignalTimeout);
        assert!(sim.keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_replay_is_retryable_and_resumes() {
        let sim = Arc::new(fixtures::dispel_screen());
        sim.add_reaction(Reaction::on_click("开始挑战").hiding(["再次进行"]));
        let config = fixtures::dispel_config();
        let round = dispel_loop(&config, &sim);
        let mut counter = RoundCounter::new(0);
        let mut run = round.start(&mut counter);

        let err = run.attempt().await.unwrap_err();
        assert_eq!(
            err,
            RoundError::SignalTimeout {
                stage: "replay".to_string(),
                signature: "replay".to_string(),
            }
        );
        assert!(err.is_retryable());
        assert_eq!(run.phase(), DispelPhase::AwaitingReplay);

        sim.show(SceneElement::text("再次进行", fixtures::REPLAY_BUTTON));
        assert_eq!(run.attempt().await.unwrap(), SessionOutcome::Continue);
        // Resumed at the replay: no second start and no second cast.
        assert_eq!(sim.clicks_on("开始挑战"), 1);
        assert_eq!(sim.keys().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_preparation() {
        let sim = Arc::new(fixtures::dispel_screen());
        let config = fixtures::dispel_config();
        let cancel = CancellationToken::new();
        let round = dispel_loop(&config, &sim).with_cancellation(cancel.clone());
        let mut counter = RoundCounter::new(0);

        cancel.cancel();
        let err = round.start(&mut counter).attempt().await.unwrap_err();
        assert_eq!(err, RoundError::Cancelled);
        assert!(sim.clicks().is_empty());
    }
}
