//! AMQP 队列订阅

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use lapin::{Channel as AmqpChannel, Consumer};
use relay_errors::{AppError, AppResult};
use relay_event_core::Channel;
use relay_ports::{ReceivedMessage, Subscription};
use tracing::info;

/// 单个队列的订阅，持有独占的 AMQP channel
///
/// 以 `no_ack` 消费：消息在投递时即被确认，处理失败不会重新入队。
pub struct AmqpSubscription {
    consumer: Consumer,
    _amqp_channel: AmqpChannel,
    channel: Channel,
}

impl AmqpSubscription {
    pub async fn start(amqp_channel: AmqpChannel, channel: Channel, tag: &str) -> AppResult<Self> {
        let consumer = amqp_channel
            .basic_consume(
                channel.name(),
                tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::broker(format!("Failed to consume {}: {}", channel, e)))?;

        info!(queue = %channel, consumer_tag = tag, "RabbitMQ consumer started");

        Ok(Self {
            consumer,
            _amqp_channel: amqp_channel,
            channel,
        })
    }
}

#[async_trait]
impl Subscription for AmqpSubscription {
    async fn next(&mut self) -> Option<AppResult<ReceivedMessage>> {
        let delivery = self.consumer.next().await?;

        Some(
            delivery
                .map(|delivery| ReceivedMessage::new(self.channel, delivery.data))
                .map_err(|e| AppError::broker(format!("RabbitMQ delivery failed: {}", e))),
        )
    }
}
