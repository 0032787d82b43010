use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards a flaky downstream (the notification broker) so that a dead
// dependency costs one fast error per call instead of one timeout per call.
//
// States:
// - Closed: calls pass through, consecutive failures are counted
// - Open: calls are refused until `timeout` has elapsed
// - HalfOpen: calls pass; `success_threshold` successes close, one failure
//   reopens
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long an open circuit refuses calls
    pub timeout: Duration,
    /// Half-open successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    inner: Arc<Mutex<Breaker>>,
    config: CircuitBreakerConfig,
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen,
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "Circuit breaker is open"),
            CircuitBreakerError::OperationFailed(e) => write!(f, "Operation failed: {}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for CircuitBreakerError<E> {}

impl CircuitBreaker {
    pub fn named(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(Breaker {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            })),
            config,
        }
    }

    /// Run `operation` unless the circuit is open.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        if !self.permit().await {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match operation.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn permit(&self) -> bool {
        let mut breaker = self.inner.lock().await;
        if breaker.state != CircuitState::Open {
            return true;
        }

        let cooled_down = breaker
            .opened_at
            .map(|at| at.elapsed() >= self.config.timeout)
            .unwrap_or(true);
        if cooled_down {
            tracing::info!(breaker = self.name, "Circuit half-open, probing downstream");
            breaker.state = CircuitState::HalfOpen;
            breaker.half_open_successes = 0;
        }
        cooled_down
    }

    async fn on_success(&self) {
        let mut breaker = self.inner.lock().await;
        match breaker.state {
            CircuitState::HalfOpen => {
                breaker.half_open_successes += 1;
                if breaker.half_open_successes >= self.config.success_threshold {
                    tracing::info!(breaker = self.name, "Circuit closed");
                    breaker.state = CircuitState::Closed;
                    breaker.consecutive_failures = 0;
                    breaker.opened_at = None;
                }
            }
            CircuitState::Closed => breaker.consecutive_failures = 0,
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut breaker = self.inner.lock().await;
        breaker.consecutive_failures += 1;

        let should_open = match breaker.state {
            CircuitState::Closed => breaker.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if should_open {
            tracing::warn!(
                breaker = self.name,
                failures = breaker.consecutive_failures,
                "Circuit opened"
            );
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.inner.lock().await.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            timeout: Duration::from_millis(50),
            success_threshold: 1,
        }
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_refuses_calls() {
        let cb = CircuitBreaker::named("sms", quick_config());

        for _ in 0..2 {
            assert!(cb.call(async { Err::<(), _>("broker down") }).await.is_err());
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        let refused = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(refused, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = CircuitBreaker::named("sms", quick_config());

        let _ = cb.call(async { Err::<(), _>("blip") }).await;
        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
        let _ = cb.call(async { Err::<(), _>("blip") }).await;

        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_circuit() {
        let cb = CircuitBreaker::named("sms", quick_config());
        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("broker down") }).await;
        }

        tokio::time::sleep(Duration::from_millis(80)).await;

        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::named("sms", quick_config());
        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("broker down") }).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        let _ = cb.call(async { Err::<(), _>("still down") }).await;
        assert_eq!(cb.get_state().await, CircuitState::Open);
    }

    #[test]
    fn test_gauge_encoding() {
        assert_eq!(CircuitState::Closed.as_gauge(), 0);
        assert_eq!(CircuitState::Open.as_gauge(), 2);
    }
}
