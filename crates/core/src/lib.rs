pub mod config;
pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod port;
pub mod retry;
pub mod round;
pub mod signature;
pub mod simulation;
pub mod stage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, BranchPolicy, Config, ConfigError,
    DispelConfig, SessionTask,
};
pub use events::{create_event_channel, EventEnvelope, EventHandle, SessionEvent};
pub use orchestrator::{SessionOrchestrator, SessionReport, TerminalReason};
pub use port::{ActionPort, PortError, RecognitionPort};
pub use round::{
    AbortKind, AbortReason, RoundCounter, RoundError, RoundPlan, SessionOutcome,
};
pub use signature::{Location, Offset, Pattern, Region, Signature};
