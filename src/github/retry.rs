//! Backoff for transient GitHub failures.
//!
//! Only transient errors are retried, and only for effects that are safe to
//! repeat. Everything else gets a single attempt.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::GitHubApiError;

/// Doubling backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries after the first attempt.
    pub retries: u32,
    pub first_delay: Duration,
    pub max_delay: Duration,
}

impl Backoff {
    /// Three retries, 2s then 4s then 8s.
    pub const DEFAULT: Self = Self {
        retries: 3,
        first_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(16),
    };

    /// A single attempt.
    pub const NONE: Self = Self {
        retries: 0,
        first_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.first_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.retries).map(|retry| self.delay(retry))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `call`, retrying transient failures per `backoff`.
///
/// `name` is only used for logging.
pub async fn with_backoff<T, F, Fut>(
    name: &'static str,
    backoff: Backoff,
    mut call: F,
) -> Result<T, GitHubApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitHubApiError>>,
{
    let mut delays = backoff.delays();
    loop {
        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !error.kind.is_retriable() {
            return Err(error);
        }
        match delays.next() {
            Some(delay) => {
                debug!(call = name, ?delay, error = %error, "transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
            None => {
                if backoff.retries > 0 {
                    warn!(call = name, retries = backoff.retries, error = %error, "giving up");
                }
                return Err(error);
            }
        }
    }
}
