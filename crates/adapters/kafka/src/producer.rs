//! Kafka Producer
//!
//! 提供消息发布功能

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use relay_errors::{AppError, AppResult};
use relay_event_core::{Channel, Transport};
use relay_ports::EventPublisher;
use tracing::{debug, warn};

use crate::config::{ProducerConfig, client_config};

/// Kafka Event Publisher
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    timeout: Duration,
    flush_timeout: Duration,
}

impl KafkaEventPublisher {
    pub fn new(config: &ProducerConfig) -> AppResult<Self> {
        let producer: FutureProducer = client_config(config.to_client_config_entries())
            .create()
            .map_err(|e| AppError::broker(format!("Failed to create Kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            timeout: config.message_timeout,
            flush_timeout: config.flush_timeout,
        })
    }

    /// 发布到指定 topic，返回 (partition, offset)
    pub async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> AppResult<(i32, i64)> {
        let mut record: FutureRecord<'_, str, [u8]> = FutureRecord::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map_err(|(e, _)| AppError::broker(format!("Failed to publish to {}: {}", topic, e)))?;

        debug!(topic, key, partition, offset, "Message published");

        Ok((partition, offset))
    }

    /// 刷新所有待发送的消息
    pub fn flush(&self) {
        if let Err(e) = self.producer.flush(Timeout::After(self.flush_timeout)) {
            warn!(error = %e, "Kafka producer flush incomplete");
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish_raw(
        &self,
        channel: Channel,
        key: Option<&str>,
        payload: &[u8],
    ) -> AppResult<()> {
        if channel.transport() != Transport::Log {
            return Err(AppError::validation(format!(
                "{} is not a log topic",
                channel
            )));
        }

        self.send(channel.name(), key, payload).await?;
        Ok(())
    }
}
