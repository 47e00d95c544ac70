//! Progress notifications for the host's logging and notification layer.
//!
//! The engine never writes anywhere itself. It emits [`SessionEvent`]s through
//! an [`EventHandle`]; the host drains the receiving end however it likes.

mod handle;
mod types;

pub(crate) use handle::emit;
pub use handle::{create_event_channel, EventEnvelope, EventHandle};
pub use types::SessionEvent;
