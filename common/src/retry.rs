// Retry strategy implementation with exponential backoff and optional jitter

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

/// Default maximum number of attempts
pub const MAX_RETRIES: u32 = 10;

/// Retry strategy trait for calculating retry delays
pub trait RetryStrategy: Send + Sync {
    /// Delay to wait after `attempt` (1-based) has failed.
    /// Returns None once the attempt budget is spent.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if another attempt is allowed after `attempt` failed
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// Total number of attempts, including the first one
    fn max_attempts(&self) -> u32 {
        MAX_RETRIES
    }
}

/// Exponential backoff retry strategy
/// Sequence: 2s, 4s, 8s, 16s, ... (doubling, capped at `max_delay_secs`)
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: u32,
    /// Delay after the first failed attempt (default: 2)
    base_delay_secs: u64,
    /// Upper bound for a single delay (default: 1024)
    max_delay_secs: u64,
    /// Jitter factor (0.0 to 1.0, default: 0.0)
    jitter_factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay_secs: 2,
            max_delay_secs: 1024,
            jitter_factor: 0.0,
        }
    }
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new exponential backoff strategy with custom values
    pub fn with_config(
        max_attempts: u32,
        base_delay_secs: u64,
        max_delay_secs: u64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_secs,
            max_delay_secs,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Build the strategy from the `database.retry` settings
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::with_config(
            config.max_attempts,
            config.base_delay_seconds,
            config.max_delay_seconds,
            config.jitter_factor,
        )
    }

    /// Delay in seconds after `attempt` failed, without jitter
    fn calculate_base_delay(&self, attempt: u32) -> u64 {
        // base * 2^(attempt - 1), saturating so huge attempt numbers hit the cap
        let exponent = attempt.saturating_sub(1);
        let factor = 2_u64.checked_pow(exponent).unwrap_or(u64::MAX);
        self.base_delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs)
    }

    /// Returns delay in milliseconds
    fn add_jitter_ms(&self, base_delay_secs: u64) -> u64 {
        let base_delay_ms = base_delay_secs.saturating_mul(1000);
        if self.jitter_factor == 0.0 {
            return base_delay_ms;
        }

        let jitter_range_ms = (base_delay_ms as f64 * self.jitter_factor) as u64;
        let jitter_ms = if jitter_range_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_range_ms)
        } else {
            0
        };

        base_delay_ms.saturating_add(jitter_ms)
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }

        let base_delay_secs = self.calculate_base_delay(attempt);
        Some(Duration::from_millis(self.add_jitter_ms(base_delay_secs)))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Run `operation` until it succeeds, the error is not retryable, or the
/// strategy runs out of attempts. The last error is returned unchanged.
pub async fn retry_with_backoff<S, F, Fut, T, E, P>(
    strategy: &S,
    label: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    S: RetryStrategy + ?Sized,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = label, attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) if !is_retryable(&err) => {
                tracing::error!(operation = label, attempt, error = %err, "Non-retryable failure");
                return Err(err);
            }
            Err(err) => match strategy.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts = strategy.max_attempts(),
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt {} failed. Retrying in {:.1}s",
                        attempt,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::error!(
                        operation = label,
                        attempts = attempt,
                        error = %err,
                        "Giving up after exhausting retries"
                    );
                    return Err(err);
                }
            },
        }
    }
}
