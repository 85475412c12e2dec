// File: streamtools-common/src/models/mod.rs
pub mod chat;
pub mod config;
pub mod credential;
pub mod effects;

pub use chat::{ChatLogEntry, ChatMessageEvent, FilterResult, PlaybackRequest};
pub use config::{
    AppConfig, ChannelConfig, ChatLogConfig, SpeechConfig, TwitchAppConfig,
};
pub use credential::{AccessToken, CredentialState, TwitchUser};
pub use effects::SoundStretchArgs;
