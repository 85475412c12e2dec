use once_cell::sync::Lazy;
use regex::Regex;

use super::TtsFilter;
use crate::models::{AppConfig, ChatMessageEvent, FilterResult};
use crate::Error;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:https?://\S+|www\.\S+|[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}(?:/\S*)?)",
    )
    .expect("static regex")
});

/// Removes URL-shaped substrings. Matches containing `..` are kept so that
/// ellipses survive.
pub struct LinkFilter;

impl TtsFilter for LinkFilter {
    fn id(&self) -> &str {
        "tts.link"
    }

    fn name(&self) -> &str {
        "Link Filter"
    }

    fn apply(
        &self,
        _config: &AppConfig,
        _event: &ChatMessageEvent,
        speaker: &str,
        text: &str,
    ) -> Result<FilterResult, Error> {
        let stripped = URL_RE.replace_all(text, |caps: &regex::Captures| {
            let m = &caps[0];
            if m.contains("..") { m.to_string() } else { String::new() }
        });
        Ok(FilterResult::new(speaker, stripped.into_owned()))
    }
}
