//! Types for the session orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::round::AbortReason;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "terminal", rename_all = "snake_case")]
pub enum TerminalReason {
    /// The round limit was reached.
    ExhaustedLimit,
    /// The session withdrew deliberately.
    Withdrew,
    Aborted(AbortReason),
}

impl TerminalReason {
    /// Short label used for metrics and events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExhaustedLimit => "exhausted_limit",
            Self::Withdrew => "withdrew",
            Self::Aborted(_) => "aborted",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExhaustedLimit => f.write_str("exhausted-limit"),
            Self::Withdrew => f.write_str("withdrew"),
            Self::Aborted(reason) => write!(f, "aborted({})", reason),
        }
    }
}

/// Terminal report of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub rounds_completed: u32,
    pub terminal: TerminalReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
