//! Bounded retry for rate-limited requests.
//!
//! Only `rate_limited` errors are retried. Everything else, including
//! transient network failures, surfaces to the caller on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ProviderResult;

/// How many times and how long to wait when a provider throttles us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt when the server sends no hint.
    pub base_delay: Duration,
    /// Upper bound for any single delay, hinted or computed.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let delay = hint.unwrap_or_else(|| {
            let exp = attempt.saturating_sub(1).min(16);
            self.base_delay.saturating_mul(1 << exp)
        });
        delay.min(self.max_delay)
    }
}

/// Runs `op`, retrying rate-limited failures according to `policy`.
pub async fn retry_rate_limited<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_rate_limited() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, err.retry_after());
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off: {}",
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
