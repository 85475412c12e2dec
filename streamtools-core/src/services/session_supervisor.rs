// streamtools-core/src/services/session_supervisor.rs
//
// Keeps exactly one ChannelSession per configured channel. `tick` is called
// on a fixed interval by the reconcile task.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::chat::hub::channel_key;
use crate::services::channel_session::{ChannelSession, SessionContext};

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct SessionSupervisor {
    ctx: SessionContext,
    sessions: Mutex<HashMap<String, Arc<ChannelSession>>>,
}

impl SessionSupervisor {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Disposes sessions whose channel left the configuration, then creates
    /// and connects sessions for channels that joined it. Channels present in
    /// both are untouched. A channel that fails to connect is retried on the
    /// next tick.
    pub async fn tick(&self) -> ReconcileReport {
        let configured: BTreeMap<String, String> = self
            .ctx
            .config
            .channel_names()
            .into_iter()
            .map(|name| (channel_key(&name), name))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        let mut report = ReconcileReport::default();
        let mut sessions = self.sessions.lock().await;

        let stale: Vec<String> = sessions
            .keys()
            .filter(|key| !configured.contains_key(*key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(session) = sessions.remove(&key) {
                session.dispose().await;
                report.removed.push(session.channel().to_string());
            }
        }

        for (key, name) in configured {
            if sessions.contains_key(&key) {
                continue;
            }
            let session = match ChannelSession::new(&name, &self.ctx) {
                Ok(s) => s,
                Err(e) => {
                    error!("(SessionSupervisor) could not start session for #{name} => {e}");
                    continue;
                }
            };
            if let Err(e) = session.connect().await {
                error!("(SessionSupervisor) could not connect #{name} => {e}");
                session.dispose().await;
                continue;
            }
            sessions.insert(key, Arc::new(session));
            report.added.push(name);
        }

        if !report.is_empty() {
            info!(
                "(SessionSupervisor) added {:?}, removed {:?}",
                report.added, report.removed
            );
        }
        report
    }

    pub async fn running_channels(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        let mut names: Vec<String> = sessions.values().map(|s| s.channel().to_string()).collect();
        names.sort();
        names
    }

    pub async fn session(&self, channel: &str) -> Option<Arc<ChannelSession>> {
        self.sessions.lock().await.get(&channel_key(channel)).cloned()
    }

    pub async fn pause(&self, channel: &str) -> bool {
        self.with_session(channel, |s| s.pause()).await
    }

    pub async fn resume(&self, channel: &str) -> bool {
        self.with_session(channel, |s| s.resume()).await
    }

    pub async fn skip_current(&self, channel: &str) -> bool {
        self.with_session(channel, |s| s.skip_current()).await
    }

    pub async fn skip_all(&self, channel: &str) -> bool {
        self.with_session(channel, |s| s.skip_all()).await
    }

    pub async fn current_speaker(&self, channel: &str) -> Option<String> {
        self.session(channel).await.map(|s| s.current_speaker())
    }

    /// Disposes every running session.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<ChannelSession>> =
            self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in drained {
            session.dispose().await;
        }
    }

    async fn with_session(&self, channel: &str, f: impl FnOnce(&ChannelSession)) -> bool {
        match self.session(channel).await {
            Some(s) => {
                f(&s);
                true
            }
            None => false,
        }
    }
}
