use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::credential::AccessToken;
use crate::models::effects::SoundStretchArgs;

/// Settings for a single monitored chat channel. `twitch_channel` is the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelConfig {
    pub twitch_channel: String,
    pub output_device: Option<String>,
    pub tts_on: bool,
    pub tts_voice: Option<String>,
    pub tts_volume: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            twitch_channel: String::new(),
            output_device: None,
            tts_on: true,
            tts_voice: None,
            tts_volume: 50,
        }
    }
}

impl ChannelConfig {
    pub fn new(channel: &str) -> Self {
        Self {
            twitch_channel: channel.to_string(),
            ..Default::default()
        }
    }
}

/// Application registration used for refreshing tokens.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TwitchAppConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    /// Companion endpoint that refreshes tokens on behalf of clients
    /// that do not hold the client secret.
    pub refresh_proxy_url: Option<String>,
}

/// External speech renderer invocation.
///
/// `args` is a template; `{text}`, `{voice}`, `{volume}`, `{amplitude}` and
/// `{output}` are substituted per utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechConfig {
    pub program: String,
    pub args: Vec<String>,
    pub voice_args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            args: vec![
                "-a".into(),
                "{amplitude}".into(),
                "-w".into(),
                "{output}".into(),
                "--".into(),
                "{text}".into(),
            ],
            voice_args: vec!["-v".into(), "{voice}".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatLogConfig {
    pub max_messages: usize,
    pub max_age_days: i64,
    pub path: Option<String>,
}

impl Default for ChatLogConfig {
    fn default() -> Self {
        Self {
            max_messages: 100_000,
            max_age_days: 7,
            path: None,
        }
    }
}

/// Everything persisted in the configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub twitch_username: Option<String>,
    pub oauth: Option<AccessToken>,
    pub twitch_app_config: TwitchAppConfig,
    pub twitch_chats: Vec<ChannelConfig>,
    pub tts_usernames_to_skip: Vec<String>,
    pub tts_phonetics: BTreeMap<String, String>,
    pub sound_stretch_args: Option<SoundStretchArgs>,
    pub say_username_with_message: bool,
    /// Prefix that marks a message as meant for TTS. `None` drops every `!` command.
    pub tts_command: Option<String>,
    pub speech: SpeechConfig,
    pub chat_log: ChatLogConfig,
    pub credential_check_interval_secs: u64,
    pub reconcile_interval_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            twitch_username: None,
            oauth: None,
            twitch_app_config: TwitchAppConfig::default(),
            twitch_chats: Vec::new(),
            tts_usernames_to_skip: Vec::new(),
            tts_phonetics: BTreeMap::new(),
            sound_stretch_args: None,
            say_username_with_message: true,
            tts_command: Some("!tts".to_string()),
            speech: SpeechConfig::default(),
            chat_log: ChatLogConfig::default(),
            credential_check_interval_secs: 5,
            reconcile_interval_millis: 500,
        }
    }
}

impl AppConfig {
    /// Channel names with blank entries ignored.
    pub fn channel_names(&self) -> Vec<String> {
        self.twitch_chats
            .iter()
            .map(|c| c.twitch_channel.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.twitch_chats
            .iter()
            .find(|c| c.twitch_channel.trim().eq_ignore_ascii_case(name.trim()))
    }
}
