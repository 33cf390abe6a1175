//! Kafka Consumer
//!
//! 每个消费循环独占一个 StreamConsumer

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use relay_errors::{AppError, AppResult};
use relay_event_core::Channel;
use relay_ports::{ReceivedMessage, Subscription};
use tracing::{debug, info};

use crate::config::{ConsumerConfig, client_config};

/// 单个 topic 的消费组订阅
pub struct KafkaSubscription {
    consumer: StreamConsumer,
    channel: Channel,
}

impl KafkaSubscription {
    pub fn new(config: &ConsumerConfig, channel: Channel) -> AppResult<Self> {
        let consumer: StreamConsumer = client_config(config.to_client_config_entries())
            .create()
            .map_err(|e| AppError::broker(format!("Failed to create Kafka consumer: {}", e)))?;

        consumer
            .subscribe(&[channel.name()])
            .map_err(|e| {
                AppError::broker(format!("Failed to subscribe to {}: {}", channel, e))
            })?;

        info!(
            group_id = %config.group_id,
            topic = %channel,
            "Kafka consumer subscribed"
        );

        Ok(Self { consumer, channel })
    }
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn next(&mut self) -> Option<AppResult<ReceivedMessage>> {
        let result = match self.consumer.recv().await {
            Ok(message) => {
                debug!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "Kafka message received"
                );

                Ok(ReceivedMessage {
                    channel: self.channel,
                    key: message
                        .key_view::<str>()
                        .and_then(|r| r.ok())
                        .map(|s| s.to_string()),
                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                })
            }
            Err(e) => Err(AppError::broker(format!("Kafka receive failed: {}", e))),
        };

        Some(result)
    }
}
