//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELF_*)
//! 2. TOML config file (if SHELF_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELF_*)
/// 2. TOML config file (if SHELF_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one JSON file per cached query.
    ///
    /// Set via SHELF_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Age in seconds after which a cache entry is treated as absent.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Chance (0.0-1.0) that a search runs the cleanup sweep first.
    #[serde(default = "default_cleanup_probability")]
    pub cleanup_probability: f64,

    /// Maximum number of cache files kept by the sweep.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Maximum aggregate size of cache files in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Retries after the first failed request (transient failures only).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff time unit in milliseconds; the n-th retry waits `2^n` units.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Ceiling for a single backoff delay in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Archive site root; search URLs and relative result links resolve against it.
    ///
    /// Set via SHELF_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// CSS selector for one result block.
    #[serde(default = "default_result_selector")]
    pub result_selector: String,

    /// CSS selector for the author link inside a block.
    #[serde(default = "default_author_selector")]
    pub author_selector: String,

    /// CSS selector for the primary book link inside a block.
    #[serde(default = "default_link_selector")]
    pub link_selector: String,

    /// Blocks whose text contains this marker are ads.
    #[serde(default = "default_ad_marker")]
    pub ad_marker: String,

    /// Ordered date regexes, first match wins. Capture group 1 is the value.
    #[serde(default = "default_date_patterns")]
    pub date_patterns: Vec<String>,

    /// Ordered filetype regexes, first match wins. Capture group 1 is the value.
    #[serde(default = "default_filetype_patterns")]
    pub filetype_patterns: Vec<String>,

    /// Command used to open a book URL (the URL is appended).
    ///
    /// Set via SHELF_BROWSER_COMMAND environment variable.
    #[serde(default = "default_browser_command")]
    pub browser_command: String,
}

fn default_cache_dir() -> PathBuf {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
        .map(|base| base.join("shelf"))
        .unwrap_or_else(|| PathBuf::from("./.shelf-cache"))
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cleanup_probability() -> f64 {
    0.1
}

fn default_max_entries() -> usize {
    1000
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1_000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_base_url() -> String {
    "https://annas-archive.org".into()
}

fn default_user_agent() -> String {
    concat!("shelf/", env!("CARGO_PKG_VERSION")).into()
}

fn default_result_selector() -> String {
    ".flex.pt-3.pb-3".into()
}

fn default_author_selector() -> String {
    r#"a[href*="/search?q="]"#.into()
}

fn default_link_selector() -> String {
    "a.js-vim-focus".into()
}

fn default_ad_marker() -> String {
    "Your ad here.".into()
}

fn default_date_patterns() -> Vec<String> {
    vec![r"\b([A-Z][a-z]+\.? \d{1,2}, \d{4})\b".into(), r"\b(19\d{2}|20[0-2]\d)\b".into()]
}

fn default_filetype_patterns() -> Vec<String> {
    vec![
        r" · ([A-Z][A-Z0-9]{1,5}) · ".into(),
        r"\[([A-Z][A-Z0-9]{2,5})\]".into(),
        r"\(([A-Z][A-Z0-9]{2,5})\)".into(),
        r"(?i)\.(pdf|epub|mobi|txt|zip|azw3|djvu|chm|lit|cbr|cbz)\b".into(),
        r"(?i)\b(pdf|epub|mobi|txt|zip|azw3|djvu|chm|lit|cbr|cbz)\b".into(),
    ]
}

fn default_browser_command() -> String {
    "xdg-open".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cleanup_probability: default_cleanup_probability(),
            max_entries: default_max_entries(),
            max_bytes: default_max_bytes(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            result_selector: default_result_selector(),
            author_selector: default_author_selector(),
            link_selector: default_link_selector(),
            ad_marker: default_ad_marker(),
            date_patterns: default_date_patterns(),
            filetype_patterns: default_filetype_patterns(),
            browser_command: default_browser_command(),
        }
    }
}

impl AppConfig {
    /// Cache TTL as Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Connect timeout as Duration for use with reqwest.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout as Duration for use with reqwest.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELF_`
    /// 2. TOML file from `SHELF_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELF_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELF_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
