use serde::{Deserialize, Serialize};
use std::fmt;

/// Rounds completed against the session's round limit.
///
/// A limit of 0 means unbounded. `completed` only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCounter {
    completed: u32,
    limit: u32,
}

impl RoundCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            completed: 0,
            limit,
        }
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit == 0
    }

    /// Whether another round may start.
    pub fn has_capacity(&self) -> bool {
        !self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit > 0 && self.completed >= self.limit
    }

    /// Whether the next round to complete is the last one the limit allows.
    pub fn is_last_round(&self) -> bool {
        self.limit > 0 && self.completed + 1 >= self.limit
    }

    pub(crate) fn record(&mut self) {
        self.completed = self.completed.saturating_add(1);
    }
}

/// What the orchestrator does after a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Round completed, start the next one.
    Continue,
    /// Round completed and filled the round limit.
    LimitReached,
    /// Deliberate early exit. Not an error.
    Withdraw,
    /// Hard stop.
    Abort(AbortReason),
}

impl SessionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::LimitReached => "limit_reached",
            Self::Withdraw => "withdraw",
            Self::Abort(_) => "abort",
        }
    }
}

/// Why a session stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortKind {
    SignalTimeout,
    ActionFailure,
    Configuration,
    RetryExhausted,
    PortFault,
    Cancelled,
}

impl AbortKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignalTimeout => "signal_timeout",
            Self::ActionFailure => "action_failure",
            Self::Configuration => "configuration",
            Self::RetryExhausted => "retry_exhausted",
            Self::PortFault => "port_fault",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names the stage that failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReason {
    pub kind: AbortKind,
    pub stage: String,
    pub detail: String,
}

impl AbortReason {
    pub fn new(kind: AbortKind, stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            stage: stage.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at stage '{}': {}", self.kind, self.stage, self.detail)
    }
}

/// Where a round attempt stands. A retried attempt resumes at this phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    AwaitingPrimary,
    Confirming,
    BranchChoice,
    SubSelection,
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_counter_never_exhausts() {
        let mut counter = RoundCounter::new(0);
        for _ in 0..1000 {
            counter.record();
        }
        assert!(counter.is_unbounded());
        assert!(counter.has_capacity());
        assert!(!counter.is_last_round());
        assert_eq!(counter.completed(), 1000);
    }

    #[test]
    fn test_bounded_counter() {
        let mut counter = RoundCounter::new(2);
        assert!(!counter.is_last_round());
        counter.record();
        assert!(counter.is_last_round());
        assert!(counter.has_capacity());
        counter.record();
        assert!(counter.is_exhausted());
        assert!(!counter.has_capacity());
    }

    #[test]
    fn test_abort_reason_display() {
        let reason = AbortReason::new(
            AbortKind::SignalTimeout,
            "confirm-selection",
            "confirmation not found",
        );
        assert_eq!(
            reason.to_string(),
            "signal_timeout at stage 'confirm-selection': confirmation not found"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = SessionOutcome::Abort(AbortReason::new(
            AbortKind::RetryExhausted,
            "branch-choice",
            "3 attempts failed",
        ));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "abort");
        assert_eq!(json["kind"], "retry_exhausted");
        assert_eq!(json["stage"], "branch-choice");

        let json = serde_json::to_value(SessionOutcome::LimitReached).unwrap();
        assert_eq!(json["outcome"], "limit_reached");
    }
}
