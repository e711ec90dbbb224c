//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_ttl_secs`, `max_entries` or `max_bytes` is 0
    /// - `cleanup_probability` is outside 0.0-1.0
    /// - a timeout is 0
    /// - `base_url` is not an absolute http(s) URL
    /// - a selector, the user agent or the browser command is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 {
            return Err(invalid("cache_ttl_secs", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.cleanup_probability) {
            return Err(invalid("cleanup_probability", "must be between 0.0 and 1.0"));
        }
        if self.max_entries == 0 {
            return Err(invalid("max_entries", "must be greater than 0"));
        }
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }

        if self.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms", "must be greater than 0"));
        }
        if self.read_timeout_ms == 0 {
            return Err(invalid("read_timeout_ms", "must be greater than 0"));
        }
        if self.retry_max_delay_ms < self.retry_base_ms {
            return Err(invalid("retry_max_delay_ms", "must not be smaller than retry_base_ms"));
        }

        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
            _ => return Err(invalid("base_url", "must be an absolute http(s) URL")),
        }

        for (field, value) in [
            ("result_selector", &self.result_selector),
            ("author_selector", &self.author_selector),
            ("link_selector", &self.link_selector),
            ("user_agent", &self.user_agent),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        if self.browser_command.split_whitespace().next().is_none() {
            return Err(invalid("browser_command", "must not be empty"));
        }

        if self.ad_marker.is_empty() {
            tracing::warn!("ad_marker is empty; no result blocks will be treated as ads");
        }

        Ok(())
    }
}
