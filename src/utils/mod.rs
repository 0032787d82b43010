pub mod retry;
pub mod circuit_breaker;

pub use retry::{retry_with_backoff, RetryConfig, RetryResult};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
