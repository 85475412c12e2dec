use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single inbound chat message, as delivered by a chat event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessageEvent {
    pub channel: String,
    pub user_login: String,
    pub display_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessageEvent {
    pub fn new(channel: &str, user_login: &str, display_name: &str, text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_login: user_login.to_string(),
            display_name: display_name.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// (speaker, text) threaded through the TTS filters.
///
/// An empty `text` means the message must not be spoken.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterResult {
    pub speaker: String,
    pub text: String,
}

impl FilterResult {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    /// Both fields empty; the message is suppressed entirely.
    pub fn suppressed() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One utterance waiting in (or currently owned by) a playback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub text: String,
    pub channel: String,
    pub user_login: String,
}

/// A chat line as stored in the on-disk chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLogEntry {
    pub channel: String,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ChatMessageEvent> for ChatLogEntry {
    fn from(evt: &ChatMessageEvent) -> Self {
        Self {
            channel: evt.channel.clone(),
            username: evt.display_name.clone(),
            message: evt.text.clone(),
            timestamp: evt.timestamp,
        }
    }
}
