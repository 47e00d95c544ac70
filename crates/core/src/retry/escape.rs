//! Recovery procedures run between failed attempts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::EscapeError;
use crate::config::Config;
use crate::port::{press_key, ActionPort, RecognitionPort};
use crate::signature::Signature;
use crate::stage::{pause, Stage, StageResult};

/// A recovery procedure invoked after a failed attempt.
#[async_trait]
pub trait EscapeAction: Send + Sync {
    /// Returns the name of this procedure.
    fn name(&self) -> &str;

    /// Runs the procedure. Failure is reported, never fatal to the retry loop.
    async fn escape(&self, cancel: &CancellationToken) -> Result<(), EscapeError>;
}

/// Does nothing. Attempts are simply retried.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEscape;

#[async_trait]
impl EscapeAction for NoEscape {
    fn name(&self) -> &str {
        "none"
    }

    async fn escape(&self, _cancel: &CancellationToken) -> Result<(), EscapeError> {
        Ok(())
    }
}

/// Leaves the current instance: cancel key, abandon, confirm the dialog.
pub struct AbandonInstance {
    recognizer: Arc<dyn RecognitionPort>,
    actions: Arc<dyn ActionPort>,
    cancel_key: String,
    key_hold: Duration,
    settle: Duration,
    abandon: Stage,
    dismiss: Stage,
}

impl AbandonInstance {
    /// Builds the procedure from configuration.
    ///
    /// Returns `None` when the abandon or dismiss signature is not configured.
    pub fn from_config(
        config: &Config,
        recognizer: Arc<dyn RecognitionPort>,
        actions: Arc<dyn ActionPort>,
    ) -> Option<Self> {
        let abandon = config.signatures.abandon.clone()?;
        let dismiss = config.signatures.dismiss.clone()?;
        let timing = &config.timing;
        let step = |name: &str, signature: Signature| {
            Stage::single(name, signature)
                .with_timeout(timing.stage_timeout())
                .with_poll_interval(timing.poll_interval())
                .with_settle(timing.action_delay())
        };

        Some(Self {
            recognizer,
            actions,
            cancel_key: config.escape.cancel_key.clone(),
            key_hold: timing.key_hold(),
            settle: config.escape.settle_delay(),
            abandon: step("escape-abandon", abandon),
            dismiss: step("escape-dismiss", dismiss),
        })
    }

    async fn click_through(
        &self,
        stage: &Stage,
        cancel: &CancellationToken,
    ) -> Result<(), EscapeError> {
        let port_error = |source| EscapeError::Port {
            step: stage.name().to_string(),
            source,
        };
        match stage.evaluate(self.recognizer.as_ref(), cancel).await {
            StageResult::Matched(matched) => stage
                .act(self.actions.as_ref(), &matched)
                .await
                .map_err(port_error),
            StageResult::NotFound => Err(EscapeError::SignalTimeout {
                step: stage.name().to_string(),
                signature: stage
                    .candidates()
                    .first()
                    .map(|s| s.id.clone())
                    .unwrap_or_default(),
            }),
            StageResult::Error { reason } => Err(port_error(crate::port::PortError::Fault(reason))),
            StageResult::Cancelled => Err(EscapeError::Cancelled),
        }
    }
}

#[async_trait]
impl EscapeAction for AbandonInstance {
    fn name(&self) -> &str {
        "abandon-instance"
    }

    async fn escape(&self, cancel: &CancellationToken) -> Result<(), EscapeError> {
        info!(key = %self.cancel_key, "Running escape procedure");

        if !pause(self.settle, cancel).await {
            return Err(EscapeError::Cancelled);
        }
        press_key(self.actions.as_ref(), &self.cancel_key, self.key_hold)
            .await
            .map_err(|source| EscapeError::Port {
                step: "escape-cancel-key".to_string(),
                source,
            })?;
        if !pause(self.settle, cancel).await {
            return Err(EscapeError::Cancelled);
        }

        self.click_through(&self.abandon, cancel).await?;
        self.click_through(&self.dismiss, cancel).await?;

        debug!("Escape procedure finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortError;
    use crate::signature::Location;
    use crate::simulation::{Reaction, SceneElement, SimulatedScreen};
    use crate::testing::fixtures;
    use tokio::time::Instant;

    fn abandon_button() -> Location {
        Location::new(900, 600, 160, 40)
    }

    fn ok_button() -> Location {
        Location::new(1000, 700, 100, 40)
    }

    fn procedure(sim: &Arc<SimulatedScreen>) -> AbandonInstance {
        AbandonInstance::from_config(&fixtures::config(), sim.clone(), sim.clone())
            .expect("fixture config has escape signatures")
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_instance_full_procedure() {
        let sim = Arc::new(SimulatedScreen::new());
        sim.add_reaction(
            Reaction::on_key("esc")
                .after(500)
                .showing(SceneElement::text("放弃挑战", abandon_button())),
        );
        sim.add_reaction(
            Reaction::on_click("放弃挑战")
                .hiding(["放弃挑战"])
                .showing(SceneElement::text("确定", ok_button()).appearing_after(300)),
        );
        let cancel = CancellationToken::new();

        let started = Instant::now();
        procedure(&sim).escape(&cancel).await.unwrap();

        assert_eq!(sim.keys()[0].key, "esc");
        assert_eq!(sim.clicks_on("放弃挑战"), 1);
        assert_eq!(sim.clicks_on("确定"), 1);
        // Two settle delays before the dialog is even looked for.
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_missing_dialog_reports_timeout() {
        let sim = Arc::new(SimulatedScreen::new());
        let cancel = CancellationToken::new();

        let err = procedure(&sim).escape(&cancel).await.unwrap_err();
        assert_eq!(
            err,
            EscapeError::SignalTimeout {
                step: "escape-abandon".to_string(),
                signature: "abandon".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_requires_foreground() {
        let sim = Arc::new(SimulatedScreen::new());
        sim.set_foreground(false);
        let cancel = CancellationToken::new();

        let err = procedure(&sim).escape(&cancel).await.unwrap_err();
        assert_eq!(
            err,
            EscapeError::Port {
                step: "escape-cancel-key".to_string(),
                source: PortError::NotForeground,
            }
        );
        assert!(sim.keys().is_empty());
    }

    #[test]
    fn test_from_config_without_signatures() {
        let sim = Arc::new(SimulatedScreen::new());
        let mut config = fixtures::config();
        config.signatures.dismiss = None;
        assert!(AbandonInstance::from_config(&config, sim.clone(), sim).is_none());
    }

    #[tokio::test]
    async fn test_no_escape() {
        let cancel = CancellationToken::new();
        assert!(NoEscape.escape(&cancel).await.is_ok());
        assert_eq!(NoEscape.name(), "none");
    }
}
