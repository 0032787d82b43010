use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use super::{EventPublisher, PublishError};

/// Producer for the notification topic. Delivery is awaited, so `Ok` means
/// the broker acknowledged the message.
pub struct RedpandaClient {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl RedpandaClient {
    pub fn new(brokers: &str) -> anyhow::Result<Self> {
        let delivery_timeout = Duration::from_secs(5);
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", "kitchen-orders")
            .set("message.timeout.ms", delivery_timeout.as_millis().to_string())
            .create()?;

        tracing::info!(brokers, "Redpanda producer created");
        Ok(Self {
            producer,
            delivery_timeout,
        })
    }
}

#[async_trait]
impl EventPublisher for RedpandaClient {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let delivery = self
            .producer
            .send(record, Timeout::After(self.delivery_timeout))
            .await
            .map_err(|(e, _)| PublishError::Broker(e.to_string()))?;

        tracing::debug!(
            topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "Notification delivered to broker"
        );
        Ok(())
    }
}
