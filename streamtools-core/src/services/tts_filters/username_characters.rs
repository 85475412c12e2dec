use once_cell::sync::Lazy;
use regex::Regex;

use super::TtsFilter;
use crate::models::{AppConfig, ChatMessageEvent, FilterResult};
use crate::Error;

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[a-zA-Z]+\S+").expect("static regex"));
static NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9_]+").expect("static regex"));

/// Turns digit/underscore runs in names into spaces: `@cool_guy99` reads as
/// "@cool guy ". Applies to mentions in the text and to the speaker.
pub struct UsernameCharactersFilter;

impl TtsFilter for UsernameCharactersFilter {
    fn id(&self) -> &str {
        "tts.username_characters"
    }

    fn name(&self) -> &str {
        "Username Characters Filter"
    }

    fn apply(
        &self,
        _config: &AppConfig,
        _event: &ChatMessageEvent,
        speaker: &str,
        text: &str,
    ) -> Result<FilterResult, Error> {
        let text = MENTION_RE.replace_all(text, |caps: &regex::Captures| {
            NOISE_RE.replace_all(&caps[0], " ").into_owned()
        });
        let speaker = NOISE_RE.replace_all(speaker, " ");
        Ok(FilterResult::new(speaker.into_owned(), text.into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions_and_speaker_are_normalized() {
        let evt = ChatMessageEvent::new("c", "gamer_42", "gamer_42", "hey @cool_guy99 gg 2024");
        let out = UsernameCharactersFilter
            .apply(&AppConfig::default(), &evt, "gamer_42", "hey @cool_guy99 gg 2024")
            .unwrap();
        assert_eq!(out.speaker, "gamer ");
        // plain numbers outside mentions are untouched
        assert_eq!(out.text, "hey @cool guy  gg 2024");
    }
}
