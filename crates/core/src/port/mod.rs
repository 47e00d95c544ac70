//! Capability interfaces the engine consumes from its host.
//!
//! The core never talks to a screen or an input device directly. It depends on
//! two narrow traits:
//!
//! - [`RecognitionPort`]: single-shot and bounded-wait signature probes
//! - [`ActionPort`]: clicks, key presses and foreground enforcement

mod error;
mod traits;

pub use error::PortError;
pub use traits::{press_key, ActionPort, RecognitionPort};
