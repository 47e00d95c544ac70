use serde::{Deserialize, Serialize};

/// Session event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: String,
        round_limit: u32,
        max_attempts: u32,
        alternative: String,
    },
    RoundStarted {
        round: u32,
    },
    StageMatched {
        stage: String,
        candidate: String,
    },
    /// A stage failed. `retryable` failures feed the retry budget.
    StageFailed {
        stage: String,
        attempt: u32,
        reason: String,
        retryable: bool,
    },
    EscapeInvoked {
        attempt: u32,
        succeeded: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    RoundCompleted {
        round: u32,
        outcome: String,
    },
    SessionFinished {
        session_id: String,
        rounds_completed: u32,
        terminal: String,
    },
}

impl SessionEvent {
    /// The snake_case event name, as used in the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::RoundStarted { .. } => "round_started",
            Self::StageMatched { .. } => "stage_matched",
            Self::StageFailed { .. } => "stage_failed",
            Self::EscapeInvoked { .. } => "escape_invoked",
            Self::RoundCompleted { .. } => "round_completed",
            Self::SessionFinished { .. } => "session_finished",
        }
    }
}
