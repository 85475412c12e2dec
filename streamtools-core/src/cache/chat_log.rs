// File: src/cache/chat_log.rs
//
// Append-only chat history shared by every channel session. Bounded by count
// and age; the whole document is rewritten on each append.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::models::{ChatLogConfig, ChatLogEntry};
use crate::Error;

/// Rules for trimming
#[derive(Debug, Clone)]
pub struct TrimPolicy {
    pub max_age: Duration,
    pub max_total_messages: usize,
}

impl From<&ChatLogConfig> for TrimPolicy {
    fn from(cfg: &ChatLogConfig) -> Self {
        Self {
            max_age: Duration::days(cfg.max_age_days),
            max_total_messages: cfg.max_messages,
        }
    }
}

pub struct ChatLog {
    path: Option<PathBuf>,
    policy: TrimPolicy,
    messages: Mutex<VecDeque<ChatLogEntry>>,
}

impl ChatLog {
    /// Opens the log at `path`, reading any existing entries.
    pub fn open(path: impl Into<PathBuf>, policy: TrimPolicy) -> Self {
        let path = path.into();
        let mut existing = match read_entries(&path) {
            Ok(list) => list,
            Err(e) => {
                warn!("(ChatLog) could not read {} => {e}; starting empty", path.display());
                VecDeque::new()
            }
        };
        trim(&mut existing, &policy, Utc::now());
        debug!("(ChatLog) loaded {} entries from {}", existing.len(), path.display());
        Self {
            path: Some(path),
            policy,
            messages: Mutex::new(existing),
        }
    }

    pub fn in_memory(policy: TrimPolicy) -> Self {
        Self {
            path: None,
            policy,
            messages: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends, evicts, then rewrites the file. Returns false if the write failed;
    /// the entry is kept in memory either way.
    pub fn add_message(&self, entry: ChatLogEntry) -> bool {
        let mut guard = self.messages.lock();
        guard.push_back(entry);
        trim(&mut guard, &self.policy, Utc::now());

        let Some(path) = &self.path else {
            return true;
        };
        match write_entries(path, &guard) {
            Ok(()) => true,
            Err(e) => {
                error!("(ChatLog) failed to write {} => {e}", path.display());
                false
            }
        }
    }

    /// Copy of the log, oldest first, optionally for one channel.
    pub fn messages(&self, channel: Option<&str>) -> Vec<ChatLogEntry> {
        let guard = self.messages.lock();
        guard
            .iter()
            .filter(|m| channel.is_none_or(|c| m.channel.eq_ignore_ascii_case(c)))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn trim(messages: &mut VecDeque<ChatLogEntry>, policy: &TrimPolicy, now: DateTime<Utc>) {
    let cutoff = now - policy.max_age;
    messages.retain(|m| m.timestamp >= cutoff);
    while messages.len() > policy.max_total_messages {
        messages.pop_front();
    }
}

fn read_entries(path: &Path) -> Result<VecDeque<ChatLogEntry>, Error> {
    if !path.exists() {
        return Ok(VecDeque::new());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_entries(path: &Path, messages: &VecDeque<ChatLogEntry>) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(messages)?)?;
    Ok(())
}
