//! Bounded retries around a failing stage.
//!
//! A [`RetryPolicy`] runs an [`Attempt`] until it succeeds, fails fatally, or
//! its [`RetryBudget`] is used up. Between attempts it invokes an
//! [`EscapeAction`] to bring the session back to a known screen.

mod budget;
mod error;
mod escape;
mod policy;

pub use budget::RetryBudget;
pub use error::{EscapeError, Failure, RetryError};
pub use escape::{AbandonInstance, EscapeAction, NoEscape};
pub use policy::{Attempt, RetryPolicy};
