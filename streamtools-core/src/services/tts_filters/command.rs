use super::TtsFilter;
use crate::models::{AppConfig, ChatMessageEvent, FilterResult};
use crate::Error;

/// Strips the TTS command prefix (e.g. `!tts`) and drops every other
/// `!command`, since those are meant for chat bots.
pub struct CommandFilter;

impl TtsFilter for CommandFilter {
    fn id(&self) -> &str {
        "tts.command"
    }

    fn name(&self) -> &str {
        "Command Filter"
    }

    fn apply(
        &self,
        config: &AppConfig,
        _event: &ChatMessageEvent,
        speaker: &str,
        text: &str,
    ) -> Result<FilterResult, Error> {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('!') {
            return Ok(FilterResult::new(speaker, text));
        }

        if let Some(rest) = config.tts_command.as_deref().and_then(|cmd| strip_command(trimmed, cmd)) {
            return Ok(FilterResult::new(speaker, rest.trim()));
        }
        Ok(FilterResult::new(speaker, ""))
    }
}

/// `!TTS hello` -> `Some(" hello")` for command `!tts`; `!ttsx` -> `None`.
fn strip_command<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    let command = command.trim();
    if command.is_empty() || text.len() < command.len() || !text.is_char_boundary(command.len()) {
        return None;
    }
    let (head, rest) = text.split_at(command.len());
    if !head.eq_ignore_ascii_case(command) {
        return None;
    }
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(cfg: &AppConfig, text: &str) -> String {
        let evt = ChatMessageEvent::new("c", "bob", "Bob", text);
        CommandFilter.apply(cfg, &evt, "Bob", text).unwrap().text
    }

    #[test]
    fn test_tts_prefix_is_stripped() {
        let cfg = AppConfig::default();
        assert_eq!(run(&cfg, "!tts hello there "), "hello there");
        assert_eq!(run(&cfg, "!TTS hi"), "hi");
        assert_eq!(run(&cfg, "!tts"), "");
    }

    #[test]
    fn test_other_commands_are_dropped() {
        let cfg = AppConfig::default();
        assert_eq!(run(&cfg, "!uptime"), "");
        assert_eq!(run(&cfg, "!ttsfoo bar"), "");
        assert_eq!(run(&cfg, "not a !command"), "not a !command");
    }

    #[test]
    fn test_without_tts_command_everything_is_dropped() {
        let mut cfg = AppConfig::default();
        cfg.tts_command = None;
        assert_eq!(run(&cfg, "!tts hello"), "");
    }
}
