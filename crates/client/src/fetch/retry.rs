//! Retry with exponential backoff for transient fetch failures.
//!
//! The first request is not a retry. After the n-th transient failure
//! (n starting at 1) the fetcher waits `min(base * 2^n, max_delay)` and tries
//! again, up to `max_retries` times. Terminal failures are returned at once.

use std::time::Duration;

use url::Url;

use super::{FetchError, RawDocument, Transport};

/// Default number of retries after the first request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff time unit.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default ceiling for a single backoff delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry limits and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_delay: DEFAULT_BASE_DELAY, max_delay: DEFAULT_MAX_DELAY }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Upper bound of total time spent sleeping when every retry is used.
    pub fn worst_case_wait(&self) -> Duration {
        (1..=self.max_retries).map(|n| self.delay_for(n)).sum()
    }
}

/// A transport wrapped with a retry policy.
pub struct Fetcher<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `url`, retrying transient failures per the policy.
    pub async fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError> {
        let mut retries = 0;
        loop {
            match self.transport.get(url).await {
                Ok(doc) => return Ok(doc),
                Err(err) if err.is_transient() && retries < self.policy.max_retries => {
                    retries += 1;
                    let delay = self.policy.delay_for(retries);
                    tracing::warn!(
                        url = %url,
                        retry = retries,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "fetch failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::debug!(url = %url, retries, class = %err.class(), "fetch failed: {}", err);
                    return Err(err);
                }
            }
        }
    }
}
