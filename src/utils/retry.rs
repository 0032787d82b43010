use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry
// ============================================================================
//
// Used by collaborator adapters (notification publishing) only. Order
// lifecycle operations are never retried automatically.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Short budget: a READY text that arrives a minute late is useless.
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let scaled = Duration::from_millis((current.as_millis() as f64 * self.multiplier) as u64);
        scaled.min(self.max_delay)
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Last error after every attempt failed
    Failed(E),
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed(err) => Err(err),
        }
    }
}

/// Run `operation` until it succeeds, `max_attempts` is spent, or it fails
/// with an error `is_retryable` rejects. The closure receives the 1-based
/// attempt number.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    operation_name: &str,
    config: &RetryConfig,
    is_retryable: R,
    mut operation: F,
) -> RetryResult<T, E>
where
    R: Fn(&E) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return RetryResult::Success(value);
            }
            Err(error) if !is_retryable(&error) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    error = %error,
                    "Not retryable, giving up"
                );
                return RetryResult::Failed(error);
            }
            Err(error) if attempt >= config.max_attempts => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    error = %error,
                    "Giving up after all attempts"
                );
                return RetryResult::Failed(error);
            }
            Err(error) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, backing off"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
