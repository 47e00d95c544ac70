use super::error::RoundError;
use super::types::{AbortReason, RoundCounter, SessionOutcome};
use crate::retry::Attempt;

/// A round in progress. Each attempt resumes where the previous one failed.
pub type RoundAttempt<'a> = Box<dyn Attempt<Output = SessionOutcome, Error = RoundError> + 'a>;

/// A round shape the orchestrator can drive.
pub trait RoundPlan: Send + Sync {
    /// Task name used in logs.
    fn name(&self) -> &'static str;

    /// Checks run once before the first round.
    fn preflight(&self) -> Result<(), AbortReason> {
        Ok(())
    }

    fn start_round<'a>(&'a self, counter: &'a mut RoundCounter) -> RoundAttempt<'a>;
}
