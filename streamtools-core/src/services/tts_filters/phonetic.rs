use regex::{NoExpand, RegexBuilder};

use super::TtsFilter;
use crate::models::{AppConfig, ChatMessageEvent, FilterResult};
use crate::Error;

/// Replaces configured words with how they should be pronounced. If the
/// sender's display name is itself a configured word, the speaker is
/// replaced too.
pub struct PhoneticFilter;

impl TtsFilter for PhoneticFilter {
    fn id(&self) -> &str {
        "tts.phonetic"
    }

    fn name(&self) -> &str {
        "Phonetic Filter"
    }

    fn apply(
        &self,
        config: &AppConfig,
        event: &ChatMessageEvent,
        speaker: &str,
        text: &str,
    ) -> Result<FilterResult, Error> {
        let mut message = text.to_string();
        for (word, phonetic) in &config.tts_phonetics {
            if word.is_empty() {
                continue;
            }
            let re = RegexBuilder::new(&regex::escape(word))
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Filter(format!("bad phonetic key '{word}': {e}")))?;
            message = re.replace_all(&message, NoExpand(phonetic)).into_owned();
        }

        let speaker = config
            .tts_phonetics
            .iter()
            .find(|(word, _)| word.eq_ignore_ascii_case(&event.display_name))
            .map(|(_, phonetic)| phonetic.as_str())
            .unwrap_or(speaker);

        Ok(FilterResult::new(speaker, message))
    }
}
