use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{ready_notification, Notification, NotificationChannel, NotificationDispatcher};
use crate::domain::order::{CustomerSnapshot, Order};
use crate::messaging::{EventPublisher, PublishError};
use crate::utils::{retry_with_backoff, RetryConfig};

/// Message consumed by the SMS gateway.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SmsRequest<'a> {
    notification_id: Uuid,
    order_id: Uuid,
    display_id: u32,
    channel: NotificationChannel,
    phone: &'a str,
    message: &'a str,
}

/// Hands READY notifications to the SMS gateway through a broker topic.
pub struct RedpandaNotifier {
    publisher: Arc<dyn EventPublisher>,
    topic: String,
    retry: RetryConfig,
}

impl RedpandaNotifier {
    pub fn new(publisher: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            retry: RetryConfig::conservative(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl NotificationDispatcher for RedpandaNotifier {
    async fn notify(
        &self,
        order: &Order,
        customer: &CustomerSnapshot,
    ) -> anyhow::Result<Option<Notification>> {
        let Some(mut notification) = ready_notification(order, customer) else {
            tracing::debug!(order_id = %order.id, "No phone on snapshot, skipping SMS");
            return Ok(None);
        };

        let phone = customer.phone.as_deref().unwrap_or_default().trim();
        let payload = serde_json::to_string(&SmsRequest {
            notification_id: notification.id,
            order_id: order.id,
            display_id: order.display_id,
            channel: notification.channel,
            phone,
            message: &notification.message,
        })?;
        let key = order.id.to_string();

        retry_with_backoff("publish_sms", &self.retry, PublishError::is_transient, |_attempt| {
            self.publisher.publish(&self.topic, &key, &payload)
        })
        .await
        .into_result()?;

        notification.sent_at = Utc::now();
        Ok(Some(notification))
    }
}
