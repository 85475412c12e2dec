pub mod engine;
pub mod signal;

pub use engine::{EngineState, PlaybackDeps, PlaybackEngine, DEFAULT_JOIN_TIMEOUT};
pub use signal::CompletionSignal;
