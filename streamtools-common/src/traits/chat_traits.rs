use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::models::chat::ChatMessageEvent;

/// Callback invoked once per inbound chat message.
pub type MessageHandler = Arc<dyn Fn(&ChatMessageEvent) + Send + Sync>;

/// Handle returned on registration; used to unregister exactly that callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel subscription to inbound chat messages.
#[async_trait]
pub trait ChatEventSource: Send + Sync {
    async fn add_message_callback(
        &self,
        channel: &str,
        handler: MessageHandler,
    ) -> Result<HandlerId, Error>;

    /// Returns false if the handler was not registered.
    fn remove_message_callback(&self, channel: &str, id: HandlerId) -> bool;
}
