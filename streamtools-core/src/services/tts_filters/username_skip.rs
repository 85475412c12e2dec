use super::TtsFilter;
use crate::models::{AppConfig, ChatMessageEvent, FilterResult};
use crate::Error;

/// Suppresses everything from senders on the skip list (display name,
/// case-insensitive).
pub struct UsernameSkipFilter;

impl TtsFilter for UsernameSkipFilter {
    fn id(&self) -> &str {
        "tts.username_skip"
    }

    fn name(&self) -> &str {
        "Username Skip Filter"
    }

    fn apply(
        &self,
        config: &AppConfig,
        event: &ChatMessageEvent,
        speaker: &str,
        text: &str,
    ) -> Result<FilterResult, Error> {
        let skipped = config
            .tts_usernames_to_skip
            .iter()
            .any(|u| u.trim().eq_ignore_ascii_case(&event.display_name));
        if skipped {
            return Ok(FilterResult::suppressed());
        }
        Ok(FilterResult::new(speaker, text))
    }
}
