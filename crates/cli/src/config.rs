//! Configuration file for fwatch
//!
//! Looked up at `<config dir>/fwatch/config.toml` unless `--config` names a
//! file. Every key is optional:
//!
//! ```toml
//! [watch]
//! events = ["file_name", "file_size"]   # empty or missing = all
//! timestamps = true
//! ```

use anyhow::{Context, Result};
use notifier::{ChangeEvent, EventMask};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
}

/// `[watch]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Kinds of change to report
    pub events: Vec<ChangeEvent>,
    /// Prefix each line with the local time
    pub timestamps: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            timestamps: true,
        }
    }
}

impl WatchConfig {
    /// Mask for the configured events
    pub fn mask(&self) -> EventMask {
        EventMask::from_events(self.events.iter().copied()).unwrap_or(EventMask::ALL)
    }
}

/// Default location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fwatch").join("config.toml"))
}

/// Load configuration
///
/// An explicit path must exist; the default location is optional.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return read(path);
    }

    match config_file_path() {
        Some(path) if path.exists() => read(&path),
        _ => Ok(Config::default()),
    }
}

fn read(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}
