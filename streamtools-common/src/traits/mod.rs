pub mod audio_traits;
pub mod auth_traits;
pub mod chat_traits;

pub use audio_traits::{
    AlertMonitor, AudioEffects, AudioOutput, PlaybackStream, SpeechRenderer, StoppedCallback,
};
pub use auth_traits::IdentityApi;
pub use chat_traits::{ChatEventSource, HandlerId, MessageHandler};
