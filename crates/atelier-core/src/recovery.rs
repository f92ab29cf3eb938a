//! Retry and backoff utilities.
//!
//! - **Exponential backoff**: delays grow by `multiplier` per attempt, capped
//!   at `max_delay`
//! - **Jitter**: ±25% randomization on retry sleeps
//! - **Error classification**: only errors implementing [`Retryable`] and
//!   reporting themselves retryable are retried
//!
//! ## Example
//!
//! ```no_run
//! use atelier_core::recovery::{retry_async, RetryConfig, Retryable};
//!
//! #[derive(Debug)]
//! struct Flaky;
//! impl Retryable for Flaky {
//!     fn is_retryable(&self) -> bool { true }
//! }
//!
//! # async fn example() {
//! let outcome = retry_async(RetryConfig::for_network(), || async { Err::<(), _>(Flaky) }).await;
//! assert!(outcome.result.is_err());
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Initial delay before first retry.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth).
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles each time).
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config for one-shot network calls (moderate retries).
    pub fn for_network() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    /// Create the backoff schedule for a periodic poll.
    ///
    /// The first delay equals the poll interval, so a single failure does not
    /// postpone the next regular tick.
    pub fn for_polling(interval: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries: u32::MAX,
            initial_delay: interval,
            max_delay: max_delay.max(interval),
            multiplier,
        }
    }

    /// Delay for a given attempt without jitter.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(base_delay.min(self.max_delay.as_secs_f64()))
    }

    /// Calculate delay for a given attempt number with jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped_delay = self.base_delay_for_attempt(attempt).as_secs_f64();
        if capped_delay <= 0.0 {
            return Duration::ZERO;
        }

        let jitter_range = capped_delay * 0.25;
        let mut rng = rand::rng();
        let jitter = rng.random_range(-jitter_range..jitter_range);
        let final_delay = (capped_delay + jitter)
            .max(0.0)
            .min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(final_delay)
    }
}

/// Trait for determining if an error is retryable.
pub trait Retryable {
    /// Returns true if the operation that caused this error should be retried.
    fn is_retryable(&self) -> bool;
}

/// Result of a retry operation with metadata about the attempts.
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The final result (success or last error).
    pub result: T,
    /// Number of attempts made.
    pub attempts: u32,
    /// Total time spent retrying.
    pub total_duration: Duration,
}

/// Retry an async operation with exponential backoff.
///
/// Stops at the first success, at the first non-retryable error, or when
/// `max_retries` is exhausted.
pub async fn retry_async<T, E, F, Fut>(config: RetryConfig, mut operation: F) -> RetryResult<Result<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    let start = std::time::Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    info!(
                        attempts,
                        total_ms = start.elapsed().as_millis(),
                        "Async operation succeeded after retry"
                    );
                }
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_duration: start.elapsed(),
                };
            }
            Err(e) => {
                if !e.is_retryable() || attempts > config.max_retries {
                    if e.is_retryable() {
                        warn!(
                            attempts,
                            max_retries = config.max_retries,
                            total_ms = start.elapsed().as_millis(),
                            "Async operation failed after all retries"
                        );
                    }
                    return RetryResult {
                        result: Err(e),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                }

                let delay = config.delay_for_attempt(attempts - 1);
                debug!(
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    error = ?e,
                    "Async operation failed, retrying with backoff"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 1.0,
        }
    }

    #[test]
    fn test_retry_config_delay_calculation() {
        let config = RetryConfig::default();

        let d1 = config.delay_for_attempt(0);
        assert!(d1.as_millis() >= 50 && d1.as_millis() <= 200);

        let d2 = config.delay_for_attempt(1);
        assert!(d2.as_millis() >= 150 && d2.as_millis() <= 500);

        let d10 = config.delay_for_attempt(100);
        assert!(d10 <= config.max_delay + Duration::from_millis(1));
    }

    #[test]
    fn test_polling_schedule_starts_at_interval() {
        let config = RetryConfig::for_polling(Duration::from_secs(3), Duration::from_secs(30), 2.0);
        assert_eq!(config.base_delay_for_attempt(0), Duration::from_secs(3));
        assert_eq!(config.base_delay_for_attempt(1), Duration::from_secs(6));
        assert_eq!(config.base_delay_for_attempt(2), Duration::from_secs(12));
        assert_eq!(config.base_delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_config_yaml_uses_millis() {
        let config: RetryConfig = serde_yaml::from_str(
            "max_retries: 1\ninitial_delay: 250\nmax_delay: 1000\nmultiplier: 1.5\n",
        )
        .unwrap();
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let mut call_count = 0;
        let outcome = retry_async(fast_config(3), || {
            call_count += 1;
            async { Ok::<i32, TestError>(42) }
        })
        .await;

        assert_eq!(outcome.result, Ok(42));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let mut call_count = 0;
        let outcome = retry_async(fast_config(3), || {
            call_count += 1;
            let attempt = call_count;
            async move {
                if attempt < 3 {
                    Err(TestError::Transient)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(outcome.result, Ok(42));
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let outcome = retry_async(fast_config(2), || async { Err::<i32, _>(TestError::Transient) }).await;
        assert_eq!(outcome.result, Err(TestError::Transient));
        assert_eq!(outcome.attempts, 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let outcome = retry_async(fast_config(5), || async { Err::<i32, _>(TestError::Permanent) }).await;
        assert_eq!(outcome.result, Err(TestError::Permanent));
        assert_eq!(outcome.attempts, 1);
    }
}
