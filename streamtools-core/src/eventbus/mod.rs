//! src/eventbus/mod.rs
//!
//! In-process event bus. Publishing is synchronous so it can be called from
//! the playback threads as well as from async tasks.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::models::AccessToken;

/// Events that components publish for anyone interested (UI, logging, tests).
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Fired only when the valid/invalid flag flips.
    CredentialsStatusChanged(bool),

    /// New token after login, or `None` after the credentials were deleted.
    CredentialsChanged(Option<AccessToken>),

    SessionStarted { channel: String },
    SessionStopped { channel: String },

    NowSpeaking { channel: String, user: String },
    DoneSpeaking { channel: String },
}

impl AppEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AppEvent::CredentialsStatusChanged(_) => "credentials.status_changed",
            AppEvent::CredentialsChanged(_) => "credentials.changed",
            AppEvent::SessionStarted { .. } => "session.started",
            AppEvent::SessionStopped { .. } => "session.stopped",
            AppEvent::NowSpeaking { .. } => "tts.now_speaking",
            AppEvent::DoneSpeaking { .. } => "tts.done_speaking",
        }
    }
}

/// Each subscriber gets its own unbounded `mpsc::UnboundedSender<AppEvent>`.
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<AppEvent>>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AppEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn publish(&self, event: AppEvent) {
        let mut subs = self.subscribers.lock();
        subs.retain(|s| s.send(event.clone()).is_ok());
    }
}
