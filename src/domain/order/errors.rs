use uuid::Uuid;

use crate::store::StoreError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition: {current} -> {requested}")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Order {order_id} was modified concurrently (read as {expected}, now {actual})")]
    Conflict {
        order_id: Uuid,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("Persistence failure: {0}")]
    Persistence(#[source] StoreError),
}

impl OrderError {
    /// Label used for the rejection metric.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::NotFound(_) => "not_found",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::Validation(_) => "validation",
            OrderError::Conflict { .. } => "conflict",
            OrderError::Persistence(_) => "persistence",
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            StoreError::Conflict { order_id, read, stored } => OrderError::Conflict {
                order_id,
                expected: read.status,
                actual: stored.status,
            },
            other => OrderError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Revision;

    #[test]
    fn test_invalid_transition_message_names_both_statuses() {
        let err = OrderError::InvalidTransition {
            current: OrderStatus::New,
            requested: OrderStatus::Ready,
        };
        assert_eq!(err.to_string(), "Invalid status transition: NEW -> READY");
    }

    #[test]
    fn test_store_not_found_maps_to_domain_not_found() {
        let id = Uuid::new_v4();
        let err: OrderError = StoreError::NotFound(id).into();
        assert!(matches!(err, OrderError::NotFound(found) if found == id));
    }

    #[test]
    fn test_store_conflict_maps_to_domain_conflict() {
        let id = Uuid::new_v4();
        let read = Revision {
            status: OrderStatus::New,
            updated_at: chrono::Utc::now(),
        };
        let stored = Revision {
            status: OrderStatus::Prep,
            updated_at: read.updated_at + chrono::Duration::seconds(1),
        };

        let err: OrderError = StoreError::Conflict { order_id: id, read, stored }.into();
        assert_eq!(err.kind(), "conflict");
        assert!(matches!(
            err,
            OrderError::Conflict { expected: OrderStatus::New, actual: OrderStatus::Prep, .. }
        ));
    }

    #[test]
    fn test_io_failure_maps_to_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: OrderError = StoreError::Io(io).into();
        assert!(matches!(err, OrderError::Persistence(StoreError::Io(_))));
    }
}
