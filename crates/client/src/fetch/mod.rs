//! HTTP fetch pipeline for archive search pages.
//!
//! ### Transport
//! - `Transport` is the seam between the pipeline and the network.
//! - `HttpTransport` uses reqwest with separate connect and read timeouts.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Retry
//! - `Fetcher` wraps a transport with exponential backoff (see [`retry`]).
//! - Only transient failures (5xx, 429, timeouts, connection errors) are retried.

pub mod error;
pub mod retry;
pub mod url;

use std::borrow::Cow;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use shelf_core::{AppConfig, Error, FailureClass};

pub use self::url::{UrlError, parse_base_url, resolve_link, search_url};
pub use error::FetchError;
pub use retry::{Fetcher, RetryPolicy};

use ::url::Url;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shelf/<version>")
    pub user_agent: String,

    /// TCP connect timeout (default: 10s)
    pub connect_timeout: Duration,

    /// Read timeout (default: 30s)
    pub read_timeout: Duration,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("shelf/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            ..Default::default()
        }
    }
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl RawDocument {
    /// A document that was not redirected, e.g. for tests or offline input.
    pub fn new(url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            final_url: url.clone(),
            url,
            content_type: Some("text/html".to_string()),
            body: body.into(),
            fetch_ms: 0,
        }
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Compared as `u64` so large lengths are not truncated on 32-bit targets.
fn exceeds_limit(len: u64, max_bytes: usize) -> bool {
    len > max_bytes as u64
}

/// Performs a single GET. Implementations do not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawDocument, FetchError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network {
                class: FailureClass::Terminal,
                detail: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawDocument, FetchError> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus { status: status.as_u16() });
        }

        if let Some(len) = response.content_length()
            && exceeds_limit(len, self.config.max_bytes)
        {
            return Err(FetchError::TooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes().await?;

        if exceeds_limit(body.len() as u64, self.config.max_bytes) {
            return Err(FetchError::TooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, body.len());

        Ok(RawDocument { url: url.clone(), final_url, content_type, body, fetch_ms })
    }
}
