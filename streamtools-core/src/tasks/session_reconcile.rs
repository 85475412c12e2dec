// streamtools-core/src/tasks/session_reconcile.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::SessionSupervisor;

/// Spawns a background task that reconciles channel sessions against the
/// configuration every `interval` until `cancel` fires, then disposes every
/// session.
///
/// Each tick runs as its own task so that a panic inside one is logged and
/// the next tick still happens.
pub fn spawn_session_reconcile_task(
    supervisor: Arc<SessionSupervisor>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let sup = supervisor.clone();
            if let Err(e) = tokio::spawn(async move { sup.tick().await }).await {
                error!("(SessionReconcile) tick failed => {e}");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("(SessionReconcile) stopping; disposing sessions");
        supervisor.shutdown().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::{ChatLog, TrimPolicy};
    use crate::chat::ChatHub;
    use crate::config::ConfigStore;
    use crate::models::{AppConfig, ChannelConfig, ChatLogConfig};
    use crate::playback::PlaybackDeps;
    use crate::services::SessionContext;
    use crate::test_utils::fakes::{FakeRenderer, InstantOutput};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_follows_config_and_disposes_on_cancel() {
        let mut cfg = AppConfig::default();
        cfg.twitch_chats = vec![ChannelConfig::new("alice")];
        let config = Arc::new(ConfigStore::in_memory(cfg));
        let hub = Arc::new(ChatHub::new());
        let deps = PlaybackDeps {
            renderer: Arc::new(FakeRenderer::new()),
            effects: None,
            output: Arc::new(InstantOutput::new()),
            alerts: None,
        };
        let chat_log = Arc::new(ChatLog::in_memory(TrimPolicy::from(&ChatLogConfig::default())));
        let supervisor = Arc::new(SessionSupervisor::new(SessionContext::new(
            config.clone(),
            hub.clone(),
            chat_log,
            deps,
        )));

        let cancel = CancellationToken::new();
        let handle = spawn_session_reconcile_task(supervisor.clone(), Duration::from_millis(10), cancel.clone());

        let wait_for_channels = |want: Vec<&'static str>| {
            let sup = supervisor.clone();
            async move {
                tokio::time::timeout(Duration::from_secs(5), async {
                    while sup.running_channels().await != want {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                })
                .await
                .is_ok()
            }
        };

        assert!(wait_for_channels(vec!["alice"]).await);
        config.update(|c| c.twitch_chats.push(ChannelConfig::new("bob")));
        assert!(wait_for_channels(vec!["alice", "bob"]).await);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
        assert!(supervisor.running_channels().await.is_empty());
        assert_eq!(hub.handler_count("alice"), 0);
    }
}
