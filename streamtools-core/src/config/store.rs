// streamtools-core/src/config/store.rs
//
// Owned configuration handle. Every component receives an `Arc<ConfigStore>`
// and reads settings live; nothing caches a copy across calls.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::models::{AppConfig, ChannelConfig};
use crate::Error;

const APP_DIR: &str = "streamtools";

/// `<config dir>/streamtools/config.json`, falling back to the working directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// `<data dir>/streamtools/chat-log.json`.
pub fn default_chat_log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("chat-log.json")
}

pub struct ConfigStore {
    path: Option<PathBuf>,
    inner: RwLock<AppConfig>,
}

impl ConfigStore {
    /// Store that never touches disk; `persist` always succeeds.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            path: None,
            inner: RwLock::new(config),
        }
    }

    /// Loads from `path`. A missing or unreadable document yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match read_config(&path) {
            Ok(Some(cfg)) => cfg,
            Ok(None) => {
                debug!("No configuration at {}; using defaults", path.display());
                AppConfig::default()
            }
            Err(Error::Json(e)) => {
                warn!("Configuration {} is not valid JSON => {e}; using defaults", path.display());
                backup_corrupt(&path);
                AppConfig::default()
            }
            Err(e) => {
                warn!("Failed to read configuration {} => {e}; using defaults", path.display());
                AppConfig::default()
            }
        };
        Self {
            path: Some(path),
            inner: RwLock::new(config),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> AppConfig {
        self.inner.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppConfig) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut AppConfig) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn channel(&self, name: &str) -> Option<ChannelConfig> {
        self.inner.read().channel(name).cloned()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.inner.read().channel_names()
    }

    /// Writes the whole document. Failures are logged and reported as `false`.
    pub fn persist(&self) -> bool {
        let Some(path) = &self.path else {
            return true;
        };
        let snapshot = self.snapshot();
        match write_config(path, &snapshot) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write configuration {} => {e}", path.display());
                false
            }
        }
    }
}

fn read_config(path: &Path) -> Result<Option<AppConfig>, Error> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

/// `<path>.bak` next to the original, e.g. `config.json.bak`.
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Moves an unparseable document aside so the next persist cannot overwrite it.
fn backup_corrupt(path: &Path) {
    let backup = backup_path(path);
    match fs::rename(path, &backup) {
        Ok(()) => warn!("Moved unreadable configuration to {}", backup.display()),
        Err(e) => error!("Could not back up configuration {} => {e}", path.display()),
    }
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}
