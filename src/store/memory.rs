use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    insert_into_collection, last_display_id, replace_in_collection, NewOrder, OrderStore,
    Revision, StoreError,
};
use crate::domain::order::Order;

/// Process-local store. The write lock is fair, so mutations run one at a
/// time in arrival order.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: RwLock::new(orders),
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_all(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    async fn find_by_id(&self, id: Uuid) -> Option<Order> {
        self.orders.read().await.iter().find(|o| o.id == id).cloned()
    }

    async fn create(&self, order: Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        insert_into_collection(&mut orders, order)
    }

    async fn create_next(&self, build: NewOrder) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        let order = build(last_display_id(&orders));
        insert_into_collection(&mut orders, order)
    }

    async fn update(&self, order: Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        replace_in_collection(&mut orders, order, None)
    }

    async fn compare_and_update(&self, order: Order, read: Revision) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        replace_in_collection(&mut orders, order, Some(read))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
