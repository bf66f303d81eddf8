//! Configuration types for polling watches.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Default delay between two poll cycles, in microseconds.
pub const DEFAULT_POLL_INTERVAL_MICROS: u64 = 1_000_000;

/// Configuration for a polled file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Path to the watched file or directory.
    pub path: PathBuf,

    /// Sleep between poll cycles, in microseconds.
    #[serde(default = "default_poll_interval_micros")]
    pub poll_interval_micros: u64,

    /// Substrings that remove a path from consideration.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Substrings of which a path must contain at least one, when non-empty.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Whether to follow symbolic links while enumerating.
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_poll_interval_micros() -> u64 {
    DEFAULT_POLL_INTERVAL_MICROS
}

impl WatchConfig {
    /// Create a new watch config with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval_micros: DEFAULT_POLL_INTERVAL_MICROS,
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
            follow_symlinks: false,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_micros = u64::try_from(interval.as_micros()).unwrap_or(u64::MAX);
        self
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Add an include pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_patterns.push(pattern.into());
        self
    }

    /// Enable following symbolic links.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    /// The poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_micros)
    }

    /// Parse a config from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject settings the watch loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_micros == 0 {
            return Err(WatcherError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
