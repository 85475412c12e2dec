// tests/session_supervisor_tests.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use streamtools_core::cache::{ChatLog, TrimPolicy};
use streamtools_core::chat::ChatHub;
use streamtools_core::config::ConfigStore;
use streamtools_core::eventbus::{AppEvent, EventBus};
use streamtools_core::models::{AppConfig, ChannelConfig, ChatLogConfig, ChatMessageEvent};
use streamtools_core::playback::PlaybackDeps;
use streamtools_core::services::{SessionContext, SessionSupervisor};
use streamtools_core::test_utils::fakes::{wait_for, FakeRenderer, InstantOutput};
use streamtools_core::traits::{ChatEventSource, HandlerId, MessageHandler};
use streamtools_core::Error;

struct Harness {
    config: Arc<ConfigStore>,
    hub: Arc<ChatHub>,
    chat_log: Arc<ChatLog>,
    output: InstantOutput,
    supervisor: SessionSupervisor,
}

fn config_with(channels: &[&str]) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.twitch_chats = channels.iter().map(|c| ChannelConfig::new(c)).collect();
    cfg
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn harness(channels: &[&str]) -> Harness {
    init_logging();
    let config = Arc::new(ConfigStore::in_memory(config_with(channels)));
    let hub = Arc::new(ChatHub::new());
    let chat_log = Arc::new(ChatLog::in_memory(TrimPolicy::from(&ChatLogConfig::default())));
    let output = InstantOutput::new();
    let deps = PlaybackDeps {
        renderer: Arc::new(FakeRenderer::new()),
        effects: None,
        output: Arc::new(output.clone()),
        alerts: None,
    };
    let ctx = SessionContext::new(config.clone(), hub.clone(), chat_log.clone(), deps);
    Harness {
        config,
        hub,
        chat_log,
        output,
        supervisor: SessionSupervisor::new(ctx),
    }
}

/// Chat source that refuses subscriptions while `failing` is set.
struct FlakyChat {
    inner: ChatHub,
    failing: AtomicBool,
}

#[async_trait]
impl ChatEventSource for FlakyChat {
    async fn add_message_callback(&self, channel: &str, handler: MessageHandler) -> Result<HandlerId, Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Chat("not connected".into()));
        }
        self.inner.add_message_callback(channel, handler).await
    }

    fn remove_message_callback(&self, channel: &str, id: HandlerId) -> bool {
        self.inner.remove_message_callback(channel, id)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tick_adds_and_removes_sessions() {
    let h = harness(&["alice", "bob"]);

    let report = h.supervisor.tick().await;
    assert_eq!(report.added, vec!["alice".to_string(), "bob".to_string()]);
    assert!(report.removed.is_empty());
    assert_eq!(h.supervisor.running_channels().await, vec!["alice", "bob"]);
    assert_eq!(h.hub.handler_count("bob"), 1);

    // nothing changed, nothing to do
    assert!(h.supervisor.tick().await.is_empty());

    h.config.update(|c| c.twitch_chats.retain(|ch| ch.twitch_channel != "bob"));
    let report = h.supervisor.tick().await;
    assert_eq!(report.removed, vec!["bob".to_string()]);
    assert!(report.added.is_empty());
    assert_eq!(h.supervisor.running_channels().await, vec!["alice"]);
    assert_eq!(h.hub.handler_count("bob"), 0);
    assert_eq!(h.hub.handler_count("alice"), 1);

    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blank_channel_names_are_ignored() {
    let h = harness(&["", "   "]);
    assert!(h.supervisor.tick().await.is_empty());
    assert!(h.supervisor.running_channels().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_channel_setting_change_keeps_session() {
    let h = harness(&["alice"]);
    h.supervisor.tick().await;
    let before = h.supervisor.session("alice").await.unwrap();

    h.config.update(|c| {
        c.twitch_chats[0].tts_volume = 90;
        c.twitch_chats[0].tts_voice = Some("en-us".into());
    });
    assert!(h.supervisor.tick().await.is_empty());

    let after = h.supervisor.session("alice").await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_chat_message_is_spoken_end_to_end() {
    let h = harness(&["alice"]);
    h.supervisor.tick().await;

    let delivered = h.hub.dispatch(&ChatMessageEvent::new("#Alice", "bob", "bob", "!tts hello http://x.com"));
    assert_eq!(delivered, 1);

    let output = h.output.clone();
    assert!(wait_for(Duration::from_secs(5), || output.played() == vec!["bob says hello".to_string()]));
    assert_eq!(h.chat_log.len(), 1);
    assert_eq!(h.chat_log.messages(Some("#Alice"))[0].message, "!tts hello http://x.com");

    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tts_off_logs_but_stays_silent() {
    let h = harness(&["alice"]);
    h.config.update(|c| c.twitch_chats[0].tts_on = false);
    h.supervisor.tick().await;

    h.hub.dispatch(&ChatMessageEvent::new("alice", "bob", "bob", "hello"));
    assert_eq!(h.chat_log.len(), 1);

    let session = h.supervisor.session("alice").await.unwrap();
    assert_eq!(session.queue_len(), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.output.played().is_empty());

    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_connect_is_retried_next_tick() {
    let config = Arc::new(ConfigStore::in_memory(config_with(&["alice"])));
    let chat = Arc::new(FlakyChat { inner: ChatHub::new(), failing: AtomicBool::new(true) });
    let deps = PlaybackDeps {
        renderer: Arc::new(FakeRenderer::new()),
        effects: None,
        output: Arc::new(InstantOutput::new()),
        alerts: None,
    };
    let chat_log = Arc::new(ChatLog::in_memory(TrimPolicy::from(&ChatLogConfig::default())));
    let supervisor = SessionSupervisor::new(SessionContext::new(config, chat.clone(), chat_log, deps));

    assert!(supervisor.tick().await.is_empty());
    assert!(supervisor.running_channels().await.is_empty());

    chat.failing.store(false, Ordering::SeqCst);
    assert_eq!(supervisor.tick().await.added, vec!["alice".to_string()]);
    assert_eq!(chat.inner.handler_count("alice"), 1);

    supervisor.shutdown().await;
    assert_eq!(chat.inner.handler_count("alice"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_controls_route_to_the_named_channel() {
    let h = harness(&["alice"]);
    h.supervisor.tick().await;

    assert!(h.supervisor.pause("alice").await);
    assert!(h.supervisor.resume("#ALICE").await);
    assert!(h.supervisor.skip_current("alice").await);
    assert!(h.supervisor.skip_all("alice").await);
    assert_eq!(h.supervisor.current_speaker("alice").await.as_deref(), Some(""));

    assert!(!h.supervisor.pause("carol").await);
    assert!(h.supervisor.current_speaker("carol").await.is_none());

    h.supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_lifecycle_events() {
    let config = Arc::new(ConfigStore::in_memory(config_with(&["alice"])));
    let hub = Arc::new(ChatHub::new());
    let deps = PlaybackDeps {
        renderer: Arc::new(FakeRenderer::new()),
        effects: None,
        output: Arc::new(InstantOutput::new()),
        alerts: None,
    };
    let chat_log = Arc::new(ChatLog::in_memory(TrimPolicy::from(&ChatLogConfig::default())));
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let ctx = SessionContext::new(config, hub.clone(), chat_log, deps).with_bus(bus);
    let supervisor = SessionSupervisor::new(ctx);

    supervisor.tick().await;
    hub.dispatch(&ChatMessageEvent::new("alice", "bob", "Bob", "hi there"));

    let mut seen = Vec::new();
    let got_done = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(evt) = rx.recv().await {
            let done = matches!(evt, AppEvent::DoneSpeaking { .. });
            seen.push(evt);
            if done {
                break;
            }
        }
    })
    .await;
    assert!(got_done.is_ok(), "events so far: {seen:?}");

    assert_eq!(seen[0], AppEvent::SessionStarted { channel: "alice".into() });
    assert!(seen.contains(&AppEvent::NowSpeaking { channel: "alice".into(), user: "bob".into() }));

    supervisor.shutdown().await;
    let stopped = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(AppEvent::SessionStopped { channel }) => return Some(channel),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await;
    assert_eq!(stopped.ok().flatten().as_deref(), Some("alice"));
}
