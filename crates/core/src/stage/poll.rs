//! Stage polling implementation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::types::{Matched, StageResult};
use crate::port::{ActionPort, PortError, RecognitionPort};
use crate::signature::{Offset, Region, Signature};

/// A named polling step over one or more candidate signatures.
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    candidates: Vec<Signature>,
    timeout: Duration,
    poll_interval: Duration,
    settle: Duration,
    offset: Option<Offset>,
}

impl Stage {
    /// Creates a stage. Candidates keep their declaration order.
    pub fn new(name: impl Into<String>, candidates: Vec<Signature>) -> Self {
        Self {
            name: name.into(),
            candidates,
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            settle: Duration::ZERO,
            offset: None,
        }
    }

    pub fn single(name: impl Into<String>, signature: Signature) -> Self {
        Self::new(name, vec![signature])
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Pause after [`Stage::act`] so the UI transition can finish.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_offset(mut self, offset: Offset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Restricts every candidate to `region`, overriding their own regions.
    pub fn within(mut self, region: Region) -> Self {
        self.candidates = self
            .candidates
            .into_iter()
            .map(|c| c.within(region))
            .collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn candidates(&self) -> &[Signature] {
        &self.candidates
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One tick: probes every candidate in declaration order.
    pub async fn probe(&self, recognizer: &dyn RecognitionPort) -> StageResult {
        for candidate in &self.candidates {
            match recognizer.recognize(candidate).await {
                Ok(Some(location)) => return StageResult::matched(&candidate.id, location),
                Ok(None) => {}
                Err(e) => return self.fault(e),
            }
        }
        StageResult::NotFound
    }

    /// Polls until a candidate appears, the timeout elapses, or `cancel` fires.
    pub async fn evaluate(
        &self,
        recognizer: &dyn RecognitionPort,
        cancel: &CancellationToken,
    ) -> StageResult {
        if cancel.is_cancelled() {
            return StageResult::Cancelled;
        }

        debug!(
            stage = %self.name,
            candidates = self.candidates.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Evaluating stage"
        );

        if let [candidate] = self.candidates.as_slice() {
            return tokio::select! {
                biased;
                _ = cancel.cancelled() => StageResult::Cancelled,
                found = recognizer.wait_for(candidate, self.timeout, self.poll_interval) => {
                    match found {
                        Ok(Some(location)) => StageResult::matched(&candidate.id, location),
                        Ok(None) => StageResult::NotFound,
                        Err(e) => self.fault(e),
                    }
                }
            };
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let result = self.probe(recognizer).await;
            if !matches!(result, StageResult::NotFound) {
                return result;
            }
            let now = Instant::now();
            if now >= deadline {
                return StageResult::NotFound;
            }
            trace!(stage = %self.name, "No candidate visible yet");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return StageResult::Cancelled,
                _ = tokio::time::sleep(self.poll_interval.min(deadline - now)) => {}
            }
        }
    }

    /// Clicks the matched location and waits out the settle delay.
    ///
    /// Whether the click took effect is left to the next stage to observe.
    pub async fn act(&self, actions: &dyn ActionPort, matched: &Matched) -> Result<(), PortError> {
        debug!(stage = %self.name, candidate = %matched.candidate, "Clicking");
        actions.click_at(matched.location, self.offset).await?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(())
    }

    fn fault(&self, error: PortError) -> StageResult {
        StageResult::Error {
            reason: format!("{}: {}", self.name, error),
        }
    }
}

/// Sleeps for `duration` unless `cancel` fires first. Returns false when cancelled.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
