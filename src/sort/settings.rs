/// Runtime settings: lines per batch and worker count.
///
/// Read from `config.json` in the working directory. A missing or unreadable
/// file, or a value below 1, falls back to the built-in default for that
/// field.
use std::path::Path;
use std::thread;

use log::warn;
use serde::Deserialize;

/// Settings file looked up in the current working directory.
pub const CONFIG_FILE: &str = "config.json";

/// Lines per batch when not configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub batch_size: usize,
    pub workers: usize,
}

/// On-disk shape. Signed so that negative values parse and are rejected
/// here rather than failing the whole file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    #[serde(alias = "chunk_size")]
    batch_size: Option<i64>,
    workers: Option<i64>,
}

/// Worker count when not configured: the available parallelism.
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
        }
    }
}

fn positive(value: Option<i64>) -> Option<usize> {
    value.filter(|&v| v >= 1).and_then(|v| usize::try_from(v).ok())
}

impl Settings {
    /// Load `config.json` from the current directory.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("cannot read {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings text; invalid JSON or fields fall back to defaults.
    pub fn from_json(text: &str) -> Self {
        let file: SettingsFile = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                warn!("invalid settings: {}; using defaults", e);
                SettingsFile::default()
            }
        };
        let defaults = Self::default();
        Settings {
            batch_size: positive(file.batch_size).unwrap_or(defaults.batch_size),
            workers: positive(file.workers).unwrap_or(defaults.workers),
        }
    }

    /// Apply command-line overrides; zero keeps the current value.
    pub fn with_overrides(self, batch_size: Option<usize>, workers: Option<usize>) -> Self {
        Settings {
            batch_size: batch_size.filter(|&n| n > 0).unwrap_or(self.batch_size),
            workers: workers.filter(|&n| n > 0).unwrap_or(self.workers),
        }
    }
}
