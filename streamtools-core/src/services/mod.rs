// File: src/services/mod.rs

pub mod channel_session;
pub mod session_supervisor;
pub mod tts_filters;

pub use channel_session::{build_request, ChannelSession, SessionContext};
pub use session_supervisor::{ReconcileReport, SessionSupervisor};
pub use tts_filters::TtsFilterChain;
