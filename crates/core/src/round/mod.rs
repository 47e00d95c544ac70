//! One traversal of the session state machine.
//!
//! A walnut round waits for the round-start screen, confirms the reward,
//! picks a branch (withdraw or continue) and, when continuing, makes the
//! configured sub-selection. A dispel round starts a challenge, waits for the
//! map, casts and replays. Both are [`RoundPlan`]s; the [`RoundCounter`]
//! tracks completed rounds against the limit.

mod dispel;
mod driver;
mod error;
mod plan;
mod round_loop;
mod types;

pub use dispel::{DispelLoop, DispelPhase, DispelRun};
pub use error::RoundError;
pub use plan::{RoundAttempt, RoundPlan};
pub use round_loop::{RoundLoop, RoundRun};
pub use types::{AbortKind, AbortReason, RoundCounter, RoundPhase, SessionOutcome};
