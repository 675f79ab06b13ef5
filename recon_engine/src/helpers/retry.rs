use std::{fmt::Display, future::Future, time::Duration};

use log::*;

/// Exponential backoff policy for side-effecting calls that may fail transiently.
///
/// The call is attempted up to `max_attempts` times. Between attempt `i` (0-indexed) and `i+1` the policy waits
/// `base_delay * 2^i`. There is no wait after the final attempt. Every error is treated as retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    /// The wait that follows the failed attempt `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runs `operation` under `policy`, returning the first success or the last error once every attempt has failed.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(v) => {
                if attempt > 0 {
                    debug!("🔁️ {label} succeeded on attempt {}", attempt + 1);
                }
                return Ok(v);
            },
            Err(e) if attempt + 1 >= attempts => {
                warn!("🔁️ {label} failed on attempt {}/{attempts}. Giving up. {e}", attempt + 1);
                return Err(e);
            },
            Err(e) => {
                let wait = policy.backoff(attempt);
                warn!("🔁️ {label} failed on attempt {}/{attempts}. Retrying in {wait:?}. {e}", attempt + 1);
                tokio::time::sleep(wait).await;
                attempt += 1;
            },
        }
    }
}
