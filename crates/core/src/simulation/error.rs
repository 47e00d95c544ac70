//! Error types for the simulation host.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading a scene script.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Failed to read scene {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scene: {0}")]
    Parse(String),
}
