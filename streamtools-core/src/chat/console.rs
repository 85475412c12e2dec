// streamtools-core/src/chat/console.rs

use crate::models::ChatMessageEvent;

/// Volume used when an `!alert` line names none.
pub const DEFAULT_ALERT_VOLUME: u32 = 100;

/// An alert sound typed into the console as `!alert <file> [volume]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCommand {
    pub file: String,
    pub volume: u32,
}

/// Parses `!alert <file> [volume]`. A trailing number is the volume; anything
/// else belongs to the file name.
pub fn parse_alert_line(line: &str) -> Option<AlertCommand> {
    let rest = line.trim().strip_prefix("!alert")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    let (file, volume) = match rest.rsplit_once(char::is_whitespace) {
        Some((file, vol)) => match vol.parse::<u32>() {
            Ok(v) => (file.trim_end(), v),
            Err(_) => (rest, DEFAULT_ALERT_VOLUME),
        },
        None => (rest, DEFAULT_ALERT_VOLUME),
    };
    Some(AlertCommand { file: file.to_string(), volume })
}

/// Parses `#channel user: message` (as typed into the console feeder).
///
/// The display name is the user as typed; the login is its lowercase form.
pub fn parse_console_line(line: &str) -> Option<ChatMessageEvent> {
    let line = line.trim();
    let rest = line.strip_prefix('#')?;
    let (channel, rest) = rest.split_once(char::is_whitespace)?;
    let (user, text) = rest.split_once(':')?;
    let user = user.trim();
    if channel.is_empty() || user.is_empty() {
        return None;
    }
    Some(ChatMessageEvent::new(
        channel,
        &user.to_ascii_lowercase(),
        user,
        text.trim_start(),
    ))
}
