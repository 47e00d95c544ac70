//! One polling-and-acting step of a round.
//!
//! A [`Stage`] polls the recognition port for a set of mutually exclusive
//! candidate signatures within a timeout window and reports which one, if
//! any, appeared. When several candidates are visible in the same tick the
//! first in declaration order wins.

mod poll;
mod types;

pub(crate) use poll::pause;
pub use poll::Stage;
pub use types::{Matched, StageResult};
