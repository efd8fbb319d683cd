//! Configuration loading for the 2Eat recommendation client
//!
//! Resolution priority for the config file:
//! 1. Explicit path (command-line argument)
//! 2. `TWOEAT_CONFIG` environment variable
//! 3. `~/.config/twoeat/recs.toml` (platform config dir)
//! 4. Compiled defaults
//!
//! A missing file is not an error: a warning is logged and defaults are used.
//! A file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "TWOEAT_CONFIG";

/// Environment variable overriding `[api] base_url`
pub const API_BASE_ENV: &str = "TWOEAT_API_BASE";

/// Production API root
pub const DEFAULT_API_BASE: &str = "https://2eatapp.com/api";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecsConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, without trailing slash (e.g. `https://2eatapp.com/api`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Swipe feed tuning
///
/// These are the canonical constants of the feed; all of them can be
/// overridden from TOML for testing against a staging ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Candidates requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Queue length (including the current card) below which a top-up runs
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: usize,

    /// Recently submitted ids kept in the exclusion set
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Likes needed before the match prompt is due
    #[serde(default = "default_match_prompt_threshold")]
    pub match_prompt_threshold: usize,

    /// Ids sent as the finalize shortlist
    #[serde(default = "default_shortlist_size")]
    pub shortlist_size: usize,

    /// Candidate pool size requested when a session starts
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_page_size() -> usize {
    5
}

fn default_low_water_mark() -> usize {
    3
}

fn default_recent_window() -> usize {
    30
}

fn default_match_prompt_threshold() -> usize {
    15
}

fn default_shortlist_size() -> usize {
    3
}

fn default_min_pool_size() -> u32 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            low_water_mark: default_low_water_mark(),
            recent_window: default_recent_window(),
            match_prompt_threshold: default_match_prompt_threshold(),
            shortlist_size: default_shortlist_size(),
            min_pool_size: default_min_pool_size(),
        }
    }
}

impl FeedConfig {
    /// Validate and normalize feed settings
    ///
    /// The low-water mark is raised to 1 so a top-up always runs once the
    /// queue is empty. Zero page or shortlist sizes are rejected.
    pub fn validate(mut self) -> Result<Self> {
        if self.page_size == 0 {
            return Err(Error::Config("feed.page_size must be at least 1".to_string()));
        }
        if self.shortlist_size == 0 {
            return Err(Error::Config(
                "feed.shortlist_size must be at least 1".to_string(),
            ));
        }
        if self.match_prompt_threshold == 0 {
            return Err(Error::Config(
                "feed.match_prompt_threshold must be at least 1".to_string(),
            ));
        }
        if self.low_water_mark == 0 {
            warn!("feed.low_water_mark of 0 raised to 1");
            self.low_water_mark = 1;
        }
        Ok(self)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RecsConfig {
    /// Load configuration following the resolution priority
    ///
    /// `TWOEAT_API_BASE` is applied on top of whatever file was found.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) => Self::load_from_path(&path)?,
            None => {
                warn!("No config file found, using compiled defaults");
                Self::default()
            }
        };

        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                info!("API base overridden by {}: {}", API_BASE_ENV, base);
                config.api.base_url = base;
            }
        }

        config.feed = config.feed.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    ///
    /// Missing file: warning + defaults. Unparseable file: error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found: {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: RecsConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Resolve which config file to read, if any
///
/// An explicit path or `TWOEAT_CONFIG` is returned even if it does not
/// exist so the caller can report it; the platform default is only
/// returned when present.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|path| path.exists())
}

/// Platform default config file (`<config_dir>/twoeat/recs.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("twoeat").join("recs.toml"))
}
