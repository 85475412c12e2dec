// streamtools-core/src/services/tts_filters/chain.rs

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error};

use super::{
    CommandFilter, LinkFilter, PhoneticFilter, TtsFilter, UsernameCharactersFilter,
    UsernameSkipFilter, WordSpamFilter,
};
use crate::models::{AppConfig, ChatMessageEvent, FilterResult};

/// Fixed, ordered list of filters applied left to right.
pub struct TtsFilterChain {
    filters: Vec<Box<dyn TtsFilter>>,
}

impl Default for TtsFilterChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(LinkFilter),
            Box::new(UsernameSkipFilter),
            Box::new(UsernameCharactersFilter),
            Box::new(PhoneticFilter),
            Box::new(CommandFilter),
            Box::new(WordSpamFilter),
        ])
    }
}

impl TtsFilterChain {
    pub fn new(filters: Vec<Box<dyn TtsFilter>>) -> Self {
        Self { filters }
    }

    pub fn filter_ids(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.id()).collect()
    }

    /// Runs every filter starting from (display name, message text).
    ///
    /// A filter that errors or panics is logged and its input is passed on
    /// to the next filter unchanged.
    pub fn apply(&self, config: &AppConfig, event: &ChatMessageEvent) -> FilterResult {
        let mut current = FilterResult::new(event.display_name.clone(), event.text.clone());

        for filter in &self.filters {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                filter.apply(config, event, &current.speaker, &current.text)
            }));
            match outcome {
                Ok(Ok(next)) => current = next,
                Ok(Err(e)) => {
                    error!("(TtsFilterChain) {} failed => {e}", filter.name());
                }
                Err(_) => {
                    error!("(TtsFilterChain) {} panicked", filter.name());
                }
            }
        }

        if current.is_silent() {
            debug!(
                "(TtsFilterChain) Skipping: {} says {}",
                event.display_name, event.text
            );
        }
        current
    }
}
