//! Unified error types for shelf.
//!
//! Only [`Error::InvalidQuery`] and [`Error::Network`] end a search. Cache
//! failures are absorbed by the pipeline and logged.

use std::fmt;

/// Whether retrying a failed request can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying (5xx, rate limit, timeouts, connection failures).
    Transient,
    /// Retrying will not help (other 4xx, TLS, malformed responses).
    Terminal,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Transient => f.write_str("transient"),
            FailureClass::Terminal => f.write_str("terminal"),
        }
    }
}

/// Unified error types for the shelf workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The search query failed validation.
    #[error("INVALID_QUERY: {0}")]
    InvalidQuery(String),

    /// Fetching the search page failed.
    #[error("NETWORK_ERROR ({class}): {detail}")]
    Network { class: FailureClass, detail: String },

    /// Cache payload or layout problem.
    #[error("CACHE_ERROR: {0}")]
    Cache(String),

    /// Filesystem error from the cache store.
    #[error("CACHE_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// A selector or extraction pattern could not be compiled.
    #[error("EXTRACT_FAILED: {0}")]
    Extract(String),

    /// The interactive selection prompt failed.
    #[error("PROMPT_FAILED: {0}")]
    Prompt(String),
}

impl Error {
    /// True for errors that belong to the cache layer.
    pub fn is_cache(&self) -> bool {
        matches!(self, Error::Cache(_) | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Cache(format!("invalid payload: {err}"))
    }
}
