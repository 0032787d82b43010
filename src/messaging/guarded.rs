use std::sync::Arc;

use async_trait::async_trait;

use super::{EventPublisher, PublishError};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

/// Publisher behind a circuit breaker. Once the downstream has failed
/// `failure_threshold` times in a row, calls are refused with
/// `PublishError::CircuitOpen` until the breaker's timeout elapses.
pub struct GuardedPublisher<P> {
    name: &'static str,
    inner: P,
    breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

impl<P: EventPublisher> GuardedPublisher<P> {
    pub fn new(name: &'static str, inner: P, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            inner,
            breaker: CircuitBreaker::named(name, config),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.update_notifier_circuit(CircuitState::Closed);
        self.metrics = Some(metrics);
        self
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.get_state().await
    }
}

#[async_trait]
impl<P: EventPublisher> EventPublisher for GuardedPublisher<P> {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        let result = self
            .breaker
            .call(self.inner.publish(topic, key, payload))
            .await;

        let state = self.breaker.get_state().await;
        if let Some(metrics) = &self.metrics {
            metrics.update_notifier_circuit(state);
        }

        match result {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::warn!(breaker = self.name, topic, key, "Publish refused, circuit open");
                Err(PublishError::CircuitOpen(self.name))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::warn!(
                    breaker = self.name,
                    topic,
                    key,
                    circuit = ?state,
                    error = %e,
                    "Publish failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FlakyBroker {
        down: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl EventPublisher for FlakyBroker {
        async fn publish(&self, _: &str, _: &str, _: &str) -> Result<(), PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down {
                return Err(PublishError::Broker("connection refused".to_string()));
            }
            Ok(())
        }
    }

    fn trips_after_two() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            timeout: Duration::from_secs(3600),
            success_threshold: 1,
        }
    }

    #[tokio::test]
    async fn test_open_circuit_refuses_without_calling_broker() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let guarded = GuardedPublisher::new(
            "sms",
            FlakyBroker { down: true, ..Default::default() },
            trips_after_two(),
        )
        .with_metrics(metrics.clone());

        for _ in 0..2 {
            let err = guarded.publish("orders", "k", "{}").await.unwrap_err();
            assert!(err.is_transient());
        }
        assert_eq!(guarded.circuit_state().await, CircuitState::Open);
        assert_eq!(metrics.notifier_circuit_state.get(), 2);

        let err = guarded.publish("orders", "k", "{}").await.unwrap_err();
        assert!(matches!(err, PublishError::CircuitOpen("sms")));
        assert!(!err.is_transient());
        assert_eq!(guarded.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_healthy_broker_keeps_gauge_closed() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let guarded = GuardedPublisher::new("sms", FlakyBroker::default(), trips_after_two())
            .with_metrics(metrics.clone());

        guarded.publish("orders", "k", "{}").await.unwrap();

        assert_eq!(guarded.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.notifier_circuit_state.get(), 0);
    }
}
