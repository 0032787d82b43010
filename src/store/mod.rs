// ============================================================================
// Order Store - Durable collection of Order records
// ============================================================================
//
// Uniform interface over every backend:
// 1. Reads never fail the caller: storage trouble degrades to an empty
//    result with a warning
// 2. Mutations are serialized per store instance (FIFO write gate)
// 3. Write failures propagate; nothing is half-written
// 4. compare_and_update rejects a write unless the stored record is still
//    at the revision (status and updated_at) the writer read
// 5. create_next picks the ticket number inside the same serialized step
//    that inserts the order
//
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

mod file;
mod memory;
mod postgres;

pub use file::JsonFileOrderStore;
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Concurrent modification of {order_id}: read {read}, stored {stored}")]
    Conflict {
        order_id: Uuid,
        read: Revision,
        stored: Revision,
    },

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Status and `updated_at` of a record as a writer last read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

impl Revision {
    pub fn of(order: &Order) -> Self {
        Self {
            status: order.status,
            updated_at: order.updated_at,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.status, self.updated_at.to_rfc3339())
    }
}

/// Builds a new order from the ticket number of the most recently created
/// one (0 for an empty store).
pub type NewOrder = Box<dyn FnOnce(u32) -> Order + Send>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Full collection, in creation order. Empty if storage is unreadable.
    async fn get_all(&self) -> Vec<Order>;

    /// `None` if absent or if storage is unreadable.
    async fn find_by_id(&self, id: Uuid) -> Option<Order>;

    async fn create(&self, order: Order) -> Result<Order, StoreError>;

    /// Insert the order `build` returns. The last ticket number is read
    /// under the same write gate, so concurrent creates see each other.
    async fn create_next(&self, build: NewOrder) -> Result<Order, StoreError>;

    /// Replace an existing record. Never inserts.
    async fn update(&self, order: Order) -> Result<Order, StoreError>;

    /// Replace an existing record only if it is still at revision `read`.
    async fn compare_and_update(&self, order: Order, read: Revision) -> Result<Order, StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Ticket number of the most recently created order; the later one in
/// store order wins a `created_at` tie.
pub(crate) fn last_display_id(orders: &[Order]) -> u32 {
    orders
        .iter()
        .max_by_key(|order| order.created_at)
        .map(|order| order.display_id)
        .unwrap_or(0)
}

/// Shared insert step for the collection-based backends.
pub(crate) fn insert_into_collection(
    orders: &mut Vec<Order>,
    order: Order,
) -> Result<Order, StoreError> {
    if orders.iter().any(|existing| existing.id == order.id) {
        return Err(StoreError::AlreadyExists(order.id));
    }
    orders.push(order.clone());
    Ok(order)
}

/// Shared replace step for the collection-based backends.
pub(crate) fn replace_in_collection(
    orders: &mut [Order],
    order: Order,
    read: Option<Revision>,
) -> Result<Order, StoreError> {
    let slot = orders
        .iter_mut()
        .find(|existing| existing.id == order.id)
        .ok_or(StoreError::NotFound(order.id))?;

    if let Some(read) = read {
        let stored = Revision::of(slot);
        if stored != read {
            return Err(StoreError::Conflict {
                order_id: order.id,
                read,
                stored,
            });
        }
    }

    *slot = order.clone();
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;

    #[test]
    fn test_replace_unknown_id_is_not_found() {
        let mut orders = vec![sample_order(OrderStatus::New)];
        let stranger = sample_order(OrderStatus::New);

        let err = replace_in_collection(&mut orders, stranger, None).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(orders.len(), 1);
    }

    #[test]
    fn test_replace_with_stale_status_conflicts() {
        let mut orders = vec![sample_order(OrderStatus::Prep)];
        let mut read = Revision::of(&orders[0]);
        read.status = OrderStatus::New;
        let mut changed = orders[0].clone();
        changed.status = OrderStatus::Oven;

        let err = replace_in_collection(&mut orders, changed, Some(read)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict { read, stored, .. }
                if read.status == OrderStatus::New && stored.status == OrderStatus::Prep
        ));
        assert_eq!(orders[0].status, OrderStatus::Prep);
    }

    #[test]
    fn test_replace_after_same_status_write_conflicts() {
        let mut orders = vec![sample_order(OrderStatus::New)];
        let read = Revision::of(&orders[0]);

        // Someone else marks it paid without moving the status
        orders[0].mark_paid();
        let paid_at = orders[0].updated_at;

        let mut moved = orders[0].clone();
        moved.is_paid = false;
        moved.apply_transition(OrderStatus::Prep, None).unwrap();

        let err = replace_in_collection(&mut orders, moved, Some(read)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { stored, .. } if stored.updated_at == paid_at));
        assert!(orders[0].is_paid);
        assert_eq!(orders[0].status, OrderStatus::New);
    }

    #[test]
    fn test_last_display_id_follows_latest_created() {
        assert_eq!(last_display_id(&[]), 0);

        let mut newest = sample_order(OrderStatus::New);
        newest.display_id = 9;
        let mut tied = newest.clone();
        tied.id = Uuid::now_v7();
        tied.display_id = 10;
        let mut oldest = sample_order(OrderStatus::Completed);
        oldest.display_id = 44;
        oldest.created_at = newest.created_at - chrono::Duration::minutes(5);

        assert_eq!(last_display_id(&[newest.clone(), oldest.clone()]), 9);
        assert_eq!(last_display_id(&[newest, oldest, tied]), 10);
    }
}
