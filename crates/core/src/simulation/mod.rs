//! In-process screen simulation.
//!
//! [`SimulatedScreen`] implements both host ports over a scripted set of
//! on-screen elements. Elements appear on a timeline and react to clicks and
//! key presses, which is enough to rehearse a full session without a game
//! running. Time is read from tokio's clock, so tests can drive it with
//! paused time.
//!
//! # Example
//!
//! ```ignore
//! use walnut_core::simulation::{Scene, SimulatedScreen};
//!
//! let scene = Scene::load(Path::new("scenes/walnut.toml"))?;
//! let screen = Arc::new(SimulatedScreen::from_scene(scene));
//!
//! let orchestrator = SessionOrchestrator::new(&config, screen.clone(), screen.clone());
//! let report = orchestrator.run().await;
//! println!("{} clicks", screen.clicks().len());
//! ```

mod error;
mod scene;
mod screen;

pub use error::SimulationError;
pub use scene::{ElementLabel, Reaction, Scene, SceneElement, ScreenSize};
pub use screen::{RecordedClick, RecordedKey, SimulatedScreen};
