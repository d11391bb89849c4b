//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceKind;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Shared timer loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Persistent store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Seen-chapter window settings
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Per-source settings
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Per-source sections are validated individually by the startup code
    /// so that one bad source does not take the others down; this checks
    /// only the shared settings.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.scheduler.trigger_resolution_ms == 0 {
            return Err(AppError::validation(
                "scheduler.trigger_resolution_ms must be > 0",
            ));
        }
        if self.dedup.capacity == 0 {
            return Err(AppError::validation("dedup.capacity must be > 0"));
        }
        if self.store.path.trim().is_empty() {
            return Err(AppError::validation("store.path is empty"));
        }
        Ok(())
    }
}

/// HTTP client settings shared by all source adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Shared timer loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tasks due within this many milliseconds of a wake-up fire immediately
    #[serde(default = "defaults::trigger_resolution")]
    pub trigger_resolution_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trigger_resolution_ms: defaults::trigger_resolution(),
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON state file
    #[serde(default = "defaults::store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: defaults::store_path(),
        }
    }
}

/// Seen-chapter window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Keys remembered per source before the oldest are evicted
    #[serde(default = "defaults::dedup_capacity")]
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::dedup_capacity(),
        }
    }
}

/// Per-source sections, one per supported `SourceKind`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    /// MangaDex settings
    #[serde(default)]
    pub mangadex: SourceConfig,

    /// Mangasee settings
    #[serde(default)]
    pub mangasee: SourceConfig,
}

impl SourcesConfig {
    /// Settings for one source.
    pub fn get(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::Mangadex => &self.mangadex,
            SourceKind::Mangasee => &self.mangasee,
        }
    }
}

/// Settings for a single source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Seconds between polls
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,

    /// Operator switch: a disabled source never polls, regardless of the
    /// stored enabled flag
    #[serde(default)]
    pub disabled: bool,

    /// How many of the newest releases each fetch looks at
    #[serde(default = "defaults::lookback")]
    pub lookback: usize,

    /// Readiness gates the source waits for before its first poll
    #[serde(default = "defaults::wait_for")]
    pub wait_for: Vec<String>,
}

impl SourceConfig {
    /// Validate one source section. Failures here disable only this source.
    pub fn validate(&self, kind: SourceKind) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(AppError::validation(format!(
                "sources.{kind}.poll_interval_secs must be > 0"
            )));
        }
        if self.lookback == 0 {
            return Err(AppError::validation(format!(
                "sources.{kind}.lookback must be > 0"
            )));
        }
        if self.lookback > 100 {
            return Err(AppError::validation(format!(
                "sources.{kind}.lookback must be <= 100"
            )));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::poll_interval(),
            disabled: false,
            lookback: defaults::lookback(),
            wait_for: defaults::wait_for(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; mangawatch/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Scheduler defaults
    pub fn trigger_resolution() -> u64 {
        500
    }

    // Store defaults
    pub fn store_path() -> String {
        "data/mangawatch.json".into()
    }

    // Dedup defaults
    pub fn dedup_capacity() -> usize {
        4096
    }

    // Source defaults
    pub fn poll_interval() -> u64 {
        300
    }
    pub fn lookback() -> usize {
        32
    }
    pub fn wait_for() -> Vec<String> {
        vec!["store".into(), "notifier".into()]
    }
}
