// ============================================================================
// Messaging - Broker publishing for customer notifications
// ============================================================================
//
// RedpandaClient is the bare producer. GuardedPublisher wraps any publisher
// in a circuit breaker and keeps the breaker gauge current. Errors are typed
// so callers can tell a refused call from a failed delivery.
//
// ============================================================================

use async_trait::async_trait;

mod guarded;
mod redpanda;

pub use guarded::GuardedPublisher;
pub use redpanda::RedpandaClient;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("{0} circuit is open, message not sent")]
    CircuitOpen(&'static str),

    #[error("Broker did not accept message: {0}")]
    Broker(String),
}

impl PublishError {
    /// Worth another attempt. An open circuit is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Broker(_))
    }
}

/// Anything that can put a keyed payload on a topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError>;
}
