//! Fetch error types and their retry classification.

use std::error::Error as StdError;
use std::io;

use shelf_core::{Error, FailureClass};

/// Errors from the HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The URL could not be built or parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Could not connect before the connect timeout.
    #[error("connection timeout - couldn't connect to server")]
    ConnectTimeout,

    /// The server took too long to respond.
    #[error("request timeout - server took too long to respond")]
    Timeout,

    /// The server actively refused the connection.
    #[error("connection refused - server is not accepting connections")]
    ConnectionRefused,

    /// Host name resolution failed.
    #[error("DNS lookup failed - check your internet connection and DNS settings: {0}")]
    Dns(String),

    /// Host or network unreachable.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// Any other connection-level failure.
    #[error("network connection failed: {0}")]
    Connect(String),

    /// TLS handshake or certificate failure.
    #[error("TLS error - secure connection failed: {0}")]
    Tls(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} - {}", describe_status(*status))]
    HttpStatus { status: u16 },

    /// The response body exceeded the configured limit.
    #[error("response too large: {0}")]
    TooLarge(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The connection broke while reading the response.
    #[error("network error: {0}")]
    Interrupted(String),
}

/// Human-readable cause for an HTTP status.
pub fn describe_status(status: u16) -> &'static str {
    match status {
        408 => "request timeout, try again",
        429 => "rate limited, too many requests",
        500 => "server error, try again later",
        502 => "server gateway error, service temporarily unavailable",
        503 => "service unavailable, server overloaded",
        504 => "gateway timeout, try again later",
        400..=499 => "client error, check your request",
        500..=599 => "server error",
        _ => "unexpected response status",
    }
}

impl FetchError {
    /// Whether retrying the request can help.
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::ConnectTimeout
            | FetchError::Timeout
            | FetchError::ConnectionRefused
            | FetchError::Dns(_)
            | FetchError::Unreachable(_)
            | FetchError::Connect(_)
            | FetchError::Interrupted(_) => FailureClass::Transient,

            FetchError::HttpStatus { status } => classify_status(*status),

            FetchError::InvalidUrl(_) | FetchError::Tls(_) | FetchError::TooLarge(_) | FetchError::Malformed(_) => {
                FailureClass::Terminal
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

/// 5xx, 408 and 429 are worth retrying; every other status is final.
fn classify_status(status: u16) -> FailureClass {
    match status {
        408 | 429 | 500..=599 => FailureClass::Transient,
        _ => FailureClass::Terminal,
    }
}

/// Concatenated, lower-cased messages of an error and all of its sources.
fn chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_lowercase()
}

fn is_tls_text(text: &str) -> bool {
    text.contains("certificate") || text.contains("tls") || text.contains("ssl") || text.contains("handshake")
}

/// The first `io::Error` kind found in the source chain.
fn io_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = inner.source();
    }
    None
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let text = chain_text(&err);

        if err.is_timeout() {
            return if err.is_connect() { FetchError::ConnectTimeout } else { FetchError::Timeout };
        }

        if err.is_builder() {
            return FetchError::InvalidUrl(text);
        }

        if err.is_connect() {
            return match io_kind(&err) {
                Some(io::ErrorKind::ConnectionRefused) => FetchError::ConnectionRefused,
                Some(io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable) => {
                    FetchError::Unreachable(text)
                }
                _ if text.contains("dns error") || text.contains("failed to lookup address") => FetchError::Dns(text),
                _ if is_tls_text(&text) => FetchError::Tls(text),
                _ => FetchError::Connect(text),
            };
        }

        if err.is_decode() {
            return FetchError::Malformed(text);
        }

        if let Some(status) = err.status() {
            return FetchError::HttpStatus { status: status.as_u16() };
        }

        FetchError::Interrupted(text)
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        Error::Network { class: err.class(), detail: err.to_string() }
    }
}
