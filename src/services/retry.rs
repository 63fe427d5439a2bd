use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Bounded exponential backoff. Rate-limit and timeout failures are retried
/// until `max_attempts` runs out. Anything else gets exactly one more try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to every wait.
    pub jitter: Duration,
    /// Added on top of a server-provided retry-after hint.
    pub retry_after_buffer: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based), without jitter.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        match retry_after {
            Some(hint) => delay.max(hint + self.retry_after_buffer),
            None => delay,
        }
    }

    fn jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random::<u64>() % (max + 1))
    }
}

/// Run `op` until it succeeds or the policy gives up, returning the last error.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        attempt += 1;

        let class = err.retry_class();
        if !class.is_transient() && attempt >= 2 {
            return Err(err);
        }
        if attempt >= policy.max_attempts {
            return Err(err);
        }

        let delay = policy.backoff_delay(attempt, err.retry_after()) + policy.jitter();
        tracing::warn!(
            label,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            class = ?class,
            "retrying after error: {}",
            err
        );
        tokio::time::sleep(delay).await;
    }
}
