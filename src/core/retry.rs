use crate::utils::error::{Result, ShError};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_DELAY,
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        self.base_delay
            .saturating_mul(self.backoff_factor.saturating_pow(exponent))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the retries run out. The last error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    "⚠️ {} failed ({}), retry {}/{} in {:?}",
                    name,
                    e,
                    retry,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Bounds the whole future, retries included, by `timeout`.
pub async fn ensure_timeout<T, Fut>(timeout: Option<Duration>, future: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match timeout {
        None => future.await,
        Some(duration) => match tokio::time::timeout(duration, future).await {
            Ok(result) => result,
            Err(_) => Err(ShError::TimeoutError {
                duration_ms: duration.as_millis() as u64,
            }),
        },
    }
}
