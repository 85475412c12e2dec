// streamtools-core/src/chat/hub.rs
//
// Observer registry: channel -> ordered handlers. The upstream chat client
// (or the console feeder) calls `dispatch` for every inbound message.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::models::ChatMessageEvent;
use crate::traits::{ChatEventSource, HandlerId, MessageHandler};
use crate::Error;

#[derive(Default)]
pub struct ChatHub {
    handlers: RwLock<HashMap<String, Vec<(HandlerId, MessageHandler)>>>,
}

/// `#Alice ` and `alice` name the same channel.
pub fn channel_key(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_ascii_lowercase()
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every handler registered for its channel, in
    /// registration order. A panicking handler is logged and skipped.
    /// Returns the number of handlers that completed.
    pub fn dispatch(&self, event: &ChatMessageEvent) -> usize {
        let key = channel_key(&event.channel);
        // Clone out so a handler may (un)register without deadlocking.
        let targets: Vec<(HandlerId, MessageHandler)> = match self.handlers.read().get(&key) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, handler) in targets {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("(ChatHub) handler {:?} for #{key} panicked", id.0),
            }
        }
        delivered
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        self.handlers
            .read()
            .get(&channel_key(channel))
            .map(|l| l.len())
            .unwrap_or(0)
    }

    pub fn clear(&self, channel: &str) {
        self.handlers.write().remove(&channel_key(channel));
    }

    pub fn clear_all(&self) {
        self.handlers.write().clear();
    }
}

#[async_trait]
impl ChatEventSource for ChatHub {
    async fn add_message_callback(
        &self,
        channel: &str,
        handler: MessageHandler,
    ) -> Result<HandlerId, Error> {
        let key = channel_key(channel);
        if key.is_empty() {
            return Err(Error::Chat("cannot subscribe to an unnamed channel".into()));
        }
        let id = HandlerId::new();
        self.handlers.write().entry(key.clone()).or_default().push((id, handler));
        debug!("(ChatHub) registered handler for #{key}");
        Ok(id)
    }

    fn remove_message_callback(&self, channel: &str, id: HandlerId) -> bool {
        let key = channel_key(channel);
        let mut map = self.handlers.write();
        let Some(list) = map.get_mut(&key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(&key);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: Arc<AtomicUsize>) -> MessageHandler {
        Arc::new(move |_evt: &ChatMessageEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_dispatch_matches_channel_case_insensitively() {
        let hub = ChatHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        hub.add_message_callback("#Alice", counting(hits.clone())).await.unwrap();

        hub.dispatch(&ChatMessageEvent::new("alice", "bob", "Bob", "hi"));
        hub.dispatch(&ChatMessageEvent::new("carol", "bob", "Bob", "hi"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    fn exploding(_evt: &ChatMessageEvent) {
        panic!("boom");
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_block_siblings() {
        let hub = ChatHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        hub.add_message_callback("alice", Arc::new(exploding)).await.unwrap();
        hub.add_message_callback("alice", counting(hits.clone())).await.unwrap();

        let delivered = hub.dispatch(&ChatMessageEvent::new("alice", "bob", "Bob", "hi"));
        assert_eq!(delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_only_named_handler() {
        let hub = ChatHub::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let id_a = hub.add_message_callback("alice", counting(a.clone())).await.unwrap();
        hub.add_message_callback("alice", counting(b.clone())).await.unwrap();

        assert!(hub.remove_message_callback("ALICE", id_a));
        assert!(!hub.remove_message_callback("alice", id_a));

        hub.dispatch(&ChatMessageEvent::new("alice", "bob", "Bob", "hi"));
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unnamed_channel_is_rejected() {
        let hub = ChatHub::new();
        let res = hub.add_message_callback("  ", counting(Arc::new(AtomicUsize::new(0)))).await;
        assert!(matches!(res, Err(Error::Chat(_))));
    }

    #[test]
    fn test_clear() {
        let hub = ChatHub::new();
        tokio_test::block_on(async {
            hub.add_message_callback("alice", counting(Arc::new(AtomicUsize::new(0)))).await.unwrap();
            hub.add_message_callback("bob", counting(Arc::new(AtomicUsize::new(0)))).await.unwrap();
        });
        hub.clear("alice");
        assert_eq!(hub.handler_count("alice"), 0);
        assert_eq!(hub.handler_count("bob"), 1);
        hub.clear_all();
        assert_eq!(hub.handler_count("bob"), 0);
    }
}
