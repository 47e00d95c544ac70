//! Session orchestrator.
//!
//! The orchestrator owns the round counter and one retry budget per round:
//! - **Rounds**: strictly sequential, one [`crate::round::RoundPlan`] round each
//! - **Retries**: per round, with the escape procedure between attempts
//! - **Termination**: round limit, withdrawal, abort, or cancellation

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::SessionOrchestrator;
pub use types::{SessionReport, TerminalReason};
