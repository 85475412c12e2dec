use super::TtsFilter;
use crate::models::{AppConfig, ChatMessageEvent, FilterResult};
use crate::Error;

const MAXIMUM_LETTER_OCCURRENCES: usize = 2;
const MAXIMUM_CONSECUTIVE_SAME_WORDS: usize = 2;

/// Dampens spam: `heeeeey` -> `heey`, `lol lol lol lol` -> `lol lol`.
///
/// Tokens are rejoined with single spaces.
pub struct WordSpamFilter;

impl TtsFilter for WordSpamFilter {
    fn id(&self) -> &str {
        "tts.word_spam"
    }

    fn name(&self) -> &str {
        "Word Spam Filter"
    }

    fn apply(
        &self,
        _config: &AppConfig,
        _event: &ChatMessageEvent,
        speaker: &str,
        text: &str,
    ) -> Result<FilterResult, Error> {
        Ok(FilterResult::new(speaker, dampen(text)))
    }
}

pub fn dampen(text: &str) -> String {
    let parts: Vec<String> = text.split_whitespace().map(collapse_letters).collect();
    collapse_words(parts).join(" ")
}

/// Scans from the end of the token, dropping a character once its run
/// exceeds the limit.
fn collapse_letters(token: &str) -> String {
    let mut kept: Vec<char> = Vec::with_capacity(token.len());
    let mut previous: Option<char> = None;
    let mut run = 0usize;
    for c in token.chars().rev() {
        if previous == Some(c) {
            run += 1;
        } else {
            run = 1;
        }
        previous = Some(c);
        if run <= MAXIMUM_LETTER_OCCURRENCES {
            kept.push(c);
        }
    }
    kept.iter().rev().collect()
}

/// Scans from the end of the message; the earliest repeats of a run are
/// the ones removed.
fn collapse_words(parts: Vec<String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(parts.len());
    let mut run = 0usize;
    let mut previous: Option<String> = None;
    for part in parts.into_iter().rev() {
        if previous.as_deref() == Some(part.as_str()) {
            run += 1;
        } else {
            run = 1;
        }
        if run <= MAXIMUM_CONSECUTIVE_SAME_WORDS {
            kept.push(part.clone());
        }
        previous = Some(part);
    }
    kept.reverse();
    kept
}
