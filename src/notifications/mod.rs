// ============================================================================
// Customer Notifications
// ============================================================================
//
// Contract with the order engine:
// 1. OrderService calls `notify` once when an order enters READY
// 2. `Ok(Some(_))` is handed to a NotificationStore
// 3. `Ok(None)` means nothing to send (no phone on the snapshot)
// 4. `Err(_)` is logged by the caller; it never undoes the transition
//
// Delivery mechanics (the SMS gateway itself) live downstream.
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::{CustomerSnapshot, Order, OrderType};

mod redpanda_notifier;

pub use redpanda_notifier::RedpandaNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    Sms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub order_id: Uuid,
    pub channel: NotificationChannel,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        order: &Order,
        customer: &CustomerSnapshot,
    ) -> anyhow::Result<Option<Notification>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn save(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Text sent to the customer when their order is ready.
pub fn ready_message(order: &Order, customer: &CustomerSnapshot) -> String {
    let who = customer.display_name();
    match customer.order_type {
        OrderType::Delivery => format!(
            "Hi {}, order #{} is ready and heading out for delivery.",
            who, order.display_id
        ),
        OrderType::Pickup | OrderType::DineIn => format!(
            "Hi {}, order #{} is ready for pickup at the counter.",
            who, order.display_id
        ),
    }
}

/// Builds the notification record, or `None` if there is nobody to text.
pub fn ready_notification(order: &Order, customer: &CustomerSnapshot) -> Option<Notification> {
    let phone = customer.phone.as_deref().map(str::trim).unwrap_or_default();
    if phone.is_empty() {
        return None;
    }

    Some(Notification {
        id: Uuid::new_v4(),
        order_id: order.id,
        channel: NotificationChannel::Sms,
        message: ready_message(order, customer),
        sent_at: Utc::now(),
    })
}

/// Dispatcher that only logs; used when no broker is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn notify(
        &self,
        order: &Order,
        customer: &CustomerSnapshot,
    ) -> anyhow::Result<Option<Notification>> {
        let notification = ready_notification(order, customer);
        if let Some(n) = &notification {
            tracing::info!(
                order_id = %order.id,
                display_id = order.display_id,
                channel = ?n.channel,
                message = %n.message,
                "Ready notification (log only)"
            );
        }
        Ok(notification)
    }
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    sent: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn for_order(&self, order_id: Uuid) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.order_id == order_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn save(&self, notification: Notification) -> anyhow::Result<()> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;
    use crate::domain::order::OrderStatus;

    #[test]
    fn test_no_phone_means_no_notification() {
        let order = sample_order(OrderStatus::Ready);
        let mut customer = order.customer_snapshot.clone();
        customer.phone = Some("   ".to_string());

        assert!(ready_notification(&order, &customer).is_none());
    }

    #[test]
    fn test_pickup_message_mentions_ticket() {
        let mut order = sample_order(OrderStatus::Ready);
        order.display_id = 42;

        let n = ready_notification(&order, &order.customer_snapshot).unwrap();
        assert_eq!(n.order_id, order.id);
        assert_eq!(n.channel, NotificationChannel::Sms);
        assert_eq!(n.message, "Hi Dana, order #42 is ready for pickup at the counter.");
    }

    #[test]
    fn test_delivery_message() {
        let mut order = sample_order(OrderStatus::Ready);
        order.customer_snapshot.order_type = OrderType::Delivery;

        let message = ready_message(&order, &order.customer_snapshot);
        assert!(message.contains("heading out for delivery"));
    }

    #[tokio::test]
    async fn test_store_filters_by_order() {
        let store = InMemoryNotificationStore::new();
        let order = sample_order(OrderStatus::Ready);
        let other = sample_order(OrderStatus::Ready);

        store.save(ready_notification(&order, &order.customer_snapshot).unwrap()).await.unwrap();
        store.save(ready_notification(&other, &other.customer_snapshot).unwrap()).await.unwrap();

        assert_eq!(store.for_order(order.id).await.len(), 1);
        assert_eq!(store.all().await.len(), 2);
    }
}
