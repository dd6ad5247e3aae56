//! Bounded retry with exponential backoff for asset downloads.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Backoff configuration. Jitter is added on top of the exponential delay so
/// concurrent downloads hitting the same transient failure don't retry in
/// lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_secs: 2,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    /// No-delay configuration for tests and callers that want fail-fast.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay_secs
            .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX));
        let jitter = if self.base_delay_secs > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_secs)
        } else {
            0
        };
        Duration::from_secs(exp.min(self.max_delay_secs) + jitter)
    }
}

/// Run `operation` until it succeeds, the error is not retryable, or
/// `max_retries` extra attempts are exhausted. Returns the last error.
pub async fn with_backoff<F, Fut, T, E, P>(
    config: &RetryConfig,
    retryable: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = config.max_retries + 1;
    for attempt in 0..attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts && retryable(&e) => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    "retryable failure (attempt {}/{}), next try in {}s: {}",
                    attempt + 1,
                    attempts,
                    delay.as_secs(),
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("attempts is always at least 1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[test]
    fn test_delay_is_exponential_and_capped() {
        let config = RetryConfig {
            max_retries: 8,
            base_delay_secs: 2,
            max_delay_secs: 20,
        };
        // retry 1: 2*2=4 plus jitter in 0..2
        let d = config.delay_for(1);
        assert!(d.as_secs() >= 4 && d.as_secs() < 6);
        // retry 8: 2*256 capped at 20, plus jitter in 0..2
        let d = config.delay_for(8);
        assert!(d.as_secs() >= 20 && d.as_secs() < 22);
    }

    #[tokio::test]
    async fn test_succeeds_without_retry() {
        let calls = counter();
        let c = calls.clone();
        let result: Result<u32, String> = with_backoff(
            &RetryConfig::immediate(3),
            |_| true,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = counter();
        let c = calls.clone();
        let result: Result<u32, String> = with_backoff(
            &RetryConfig::immediate(3),
            |_| true,
            || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(9)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_aborts_immediately() {
        let calls = counter();
        let c = calls.clone();
        let result: Result<u32, String> = with_backoff(
            &RetryConfig::immediate(5),
            |_| false,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("permanent".to_string())
                }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "permanent");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = counter();
        let c = calls.clone();
        let result: Result<u32, String> = with_backoff(
            &RetryConfig::immediate(2),
            |_| true,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("still failing".to_string())
                }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "still failing");
        // one initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
