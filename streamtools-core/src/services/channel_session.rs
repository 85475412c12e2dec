// streamtools-core/src/services/channel_session.rs
//
// Binds one configured channel to its TTS pipeline: chat callback -> chat log
// -> filters -> playback engine.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::cache::ChatLog;
use crate::chat::hub::channel_key;
use crate::config::ConfigStore;
use crate::eventbus::{AppEvent, EventBus};
use crate::models::{AppConfig, ChatLogEntry, ChatMessageEvent, PlaybackRequest};
use crate::playback::{EngineState, PlaybackDeps, PlaybackEngine, DEFAULT_JOIN_TIMEOUT};
use crate::services::tts_filters::TtsFilterChain;
use crate::traits::{ChatEventSource, HandlerId};
use crate::Error;

/// Everything a session needs besides its channel name. Shared by all sessions.
#[derive(Clone)]
pub struct SessionContext {
    pub config: Arc<ConfigStore>,
    pub chat: Arc<dyn ChatEventSource>,
    pub chat_log: Arc<ChatLog>,
    pub filters: Arc<TtsFilterChain>,
    pub playback: PlaybackDeps,
    pub bus: Option<EventBus>,
    pub join_timeout: Duration,
}

impl SessionContext {
    pub fn new(
        config: Arc<ConfigStore>,
        chat: Arc<dyn ChatEventSource>,
        chat_log: Arc<ChatLog>,
        playback: PlaybackDeps,
    ) -> Self {
        Self {
            config,
            chat,
            chat_log,
            filters: Arc::new(TtsFilterChain::default()),
            playback,
            bus: None,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }
}

/// Turns an inbound message into an utterance, or `None` when it must not be
/// spoken (TTS off for the channel, suppressed by a filter, nothing left).
pub fn build_request(
    config: &AppConfig,
    filters: &TtsFilterChain,
    channel: &str,
    event: &ChatMessageEvent,
) -> Option<PlaybackRequest> {
    if !config.channel(channel).is_some_and(|c| c.tts_on) {
        return None;
    }

    let result = filters.apply(config, event);
    if result.is_silent() {
        return None;
    }

    let text = result.text.trim();
    let speaker = result.speaker.trim();
    let text = if config.say_username_with_message && !speaker.is_empty() {
        format!("{speaker} says {text}")
    } else {
        text.to_string()
    };

    Some(PlaybackRequest {
        text,
        channel: channel.to_string(),
        user_login: event.user_login.clone(),
    })
}

struct Ingress {
    channel: String,
    config: Arc<ConfigStore>,
    chat_log: Arc<ChatLog>,
    filters: Arc<TtsFilterChain>,
    engine: Arc<PlaybackEngine>,
}

impl Ingress {
    fn handle(&self, event: &ChatMessageEvent) -> Option<PlaybackRequest> {
        self.chat_log.add_message(ChatLogEntry::from(event));

        let request = self
            .config
            .read(|cfg| build_request(cfg, &self.filters, &self.channel, event))?;
        debug!("(ChannelSession) #{} queueing: {}", self.channel, request.text);
        self.engine.enqueue(request.clone());
        Some(request)
    }
}

pub struct ChannelSession {
    channel: String,
    chat: Arc<dyn ChatEventSource>,
    bus: Option<EventBus>,
    join_timeout: Duration,
    ingress: Arc<Ingress>,
    engine: Arc<PlaybackEngine>,
    handler: Mutex<Option<HandlerId>>,
}

impl ChannelSession {
    /// Starts the session's playback thread. Call `connect` to start listening.
    pub fn new(channel: &str, ctx: &SessionContext) -> Result<Self, Error> {
        let engine = Arc::new(PlaybackEngine::start(
            channel,
            ctx.config.clone(),
            ctx.playback.clone(),
            ctx.bus.clone(),
        )?);
        let ingress = Arc::new(Ingress {
            channel: channel.to_string(),
            config: ctx.config.clone(),
            chat_log: ctx.chat_log.clone(),
            filters: ctx.filters.clone(),
            engine: engine.clone(),
        });
        Ok(Self {
            channel: channel.to_string(),
            chat: ctx.chat.clone(),
            bus: ctx.bus.clone(),
            join_timeout: ctx.join_timeout,
            ingress,
            engine,
            handler: Mutex::new(None),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Registers the message callback. Does nothing for an unnamed channel or
    /// when already connected.
    pub async fn connect(&self) -> Result<(), Error> {
        if channel_key(&self.channel).is_empty() {
            debug!("(ChannelSession) no channel name; not connecting");
            return Ok(());
        }
        if self.is_connected() {
            return Ok(());
        }

        let ingress = self.ingress.clone();
        let id = self
            .chat
            .add_message_callback(
                &self.channel,
                Arc::new(move |evt: &ChatMessageEvent| {
                    ingress.handle(evt);
                }),
            )
            .await?;
        *self.handler.lock() = Some(id);

        info!("(ChannelSession) connected to #{}", self.channel);
        if let Some(bus) = &self.bus {
            bus.publish(AppEvent::SessionStarted { channel: self.channel.clone() });
        }
        Ok(())
    }

    /// Runs one inbound message through the pipeline, as the chat callback
    /// does. Returns the utterance that was queued, if any.
    pub fn handle_message(&self, event: &ChatMessageEvent) -> Option<PlaybackRequest> {
        self.ingress.handle(event)
    }

    /// Unregisters the callback and stops the playback thread, waiting a
    /// bounded time for it. Returns false if the thread was abandoned.
    pub async fn dispose(&self) -> bool {
        if let Some(id) = self.handler.lock().take() {
            self.chat.remove_message_callback(&self.channel, id);
        }

        let engine = self.engine.clone();
        let timeout = self.join_timeout;
        let clean = match tokio::task::spawn_blocking(move || engine.shutdown(timeout)).await {
            Ok(clean) => clean,
            Err(e) => {
                error!("(ChannelSession) #{} shutdown task failed => {e}", self.channel);
                false
            }
        };

        info!("(ChannelSession) disposed #{}", self.channel);
        if let Some(bus) = &self.bus {
            bus.publish(AppEvent::SessionStopped { channel: self.channel.clone() });
        }
        clean
    }

    pub fn pause(&self) {
        self.engine.pause();
    }

    pub fn resume(&self) {
        self.engine.resume();
    }

    pub fn skip_current(&self) {
        self.engine.skip_current();
    }

    pub fn skip_all(&self) {
        self.engine.skip_all();
    }

    pub fn current_speaker(&self) -> String {
        self.engine.current_speaker()
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn queue_len(&self) -> usize {
        self.engine.queue_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelConfig;

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.twitch_chats = vec![ChannelConfig {
            twitch_channel: "alice".into(),
            output_device: None,
            tts_on: true,
            tts_voice: None,
            tts_volume: 50,
        }];
        cfg
    }

    fn evt(user: &str, text: &str) -> ChatMessageEvent {
        ChatMessageEvent::new("alice", &user.to_lowercase(), user, text)
    }

    #[test]
    fn test_tts_command_with_link_and_username() {
        let cfg = config();
        let req = build_request(&cfg, &TtsFilterChain::default(), "alice", &evt("bob", "!tts hello http://x.com"))
            .unwrap();
        assert_eq!(req.text, "bob says hello");
        assert_eq!(req.user_login, "bob");
        assert_eq!(req.channel, "alice");
    }

    #[test]
    fn test_without_username_prefix() {
        let mut cfg = config();
        cfg.say_username_with_message = false;
        let req = build_request(&cfg, &TtsFilterChain::default(), "alice", &evt("bob", "!tts hello http://x.com"))
            .unwrap();
        assert_eq!(req.text, "hello");
    }

    #[test]
    fn test_skip_listed_user_creates_no_request() {
        let mut cfg = config();
        cfg.tts_usernames_to_skip = vec!["Nightbot".into()];
        assert!(build_request(&cfg, &TtsFilterChain::default(), "alice", &evt("nightbot", "hello")).is_none());
    }

    #[test]
    fn test_tts_off_creates_no_request() {
        let mut cfg = config();
        cfg.twitch_chats[0].tts_on = false;
        assert!(build_request(&cfg, &TtsFilterChain::default(), "alice", &evt("bob", "hello")).is_none());
        // unknown channel behaves like TTS off
        assert!(build_request(&config(), &TtsFilterChain::default(), "carol", &evt("bob", "hello")).is_none());
    }

    #[test]
    fn test_bot_commands_and_empty_results_are_dropped() {
        let cfg = config();
        let chain = TtsFilterChain::default();
        assert!(build_request(&cfg, &chain, "alice", &evt("bob", "!uptime")).is_none());
        assert!(build_request(&cfg, &chain, "alice", &evt("bob", "https://clips.twitch.tv/abc")).is_none());
        assert!(build_request(&cfg, &chain, "alice", &evt("bob", "   ")).is_none());
    }
}
