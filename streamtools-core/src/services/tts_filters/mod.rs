//! TTS text filters.
//!
//! Each filter receives the previous filter's (speaker, text) and returns a
//! new pair. An empty text means "do not speak".

pub mod chain;
pub mod command;
pub mod link;
pub mod phonetic;
pub mod spam;
pub mod username_characters;
pub mod username_skip;

pub use chain::TtsFilterChain;
pub use command::CommandFilter;
pub use link::LinkFilter;
pub use phonetic::PhoneticFilter;
pub use spam::WordSpamFilter;
pub use username_characters::UsernameCharactersFilter;
pub use username_skip::UsernameSkipFilter;

use crate::models::{AppConfig, ChatMessageEvent, FilterResult};
use crate::Error;

/// Trait for TTS text filters
pub trait TtsFilter: Send + Sync {
    /// Unique identifier for this filter
    fn id(&self) -> &str;

    /// Human-readable name for this filter
    fn name(&self) -> &str;

    /// `event` is the untouched source message; `speaker`/`text` are the
    /// output of the previous filter.
    fn apply(
        &self,
        config: &AppConfig,
        event: &ChatMessageEvent,
        speaker: &str,
        text: &str,
    ) -> Result<FilterResult, Error>;
}
