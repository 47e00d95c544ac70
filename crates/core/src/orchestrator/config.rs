//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;

/// The session budget the orchestrator enforces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Rounds to run before reporting an exhausted limit (0 = unbounded).
    pub round_limit: u32,

    /// Attempts per round. Each round gets a fresh budget.
    pub max_attempts: u32,

    /// Fixed pause between attempts (milliseconds).
    pub retry_delay_ms: u64,
}

impl OrchestratorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            round_limit: config.session.round_limit,
            max_attempts: config.session.max_attempts,
            retry_delay_ms: config.timing.retry_delay_ms,
        }
    }
}
