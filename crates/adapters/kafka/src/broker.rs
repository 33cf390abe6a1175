//! Kafka 日志流代理
//!
//! 组合 producer、admin 与按通道创建的消费组订阅

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use relay_errors::{AppError, AppResult};
use relay_event_core::{Channel, Topology, Transport};
use relay_ports::{BrokerLifecycle, EventPublisher, EventSubscriber, Subscription};
use tracing::info;

use crate::admin::{KafkaAdmin, TopicConfig};
use crate::config::{ConsumerConfig, KafkaConfig, ProducerConfig};
use crate::consumer::KafkaSubscription;
use crate::health::check_kafka_health;
use crate::producer::KafkaEventPublisher;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Kafka 日志流适配器
pub struct KafkaBroker {
    base: KafkaConfig,
    producer: KafkaEventPublisher,
    admin: KafkaAdmin,
    closed: AtomicBool,
}

impl KafkaBroker {
    /// 连接并校验 broker 可达；不可达即返回错误，不重试
    pub async fn connect(brokers: &str, client_id: &str) -> AppResult<Self> {
        let base = KafkaConfig::new(brokers).with_client_id(client_id);

        let health = check_kafka_health(base.clone(), CONNECT_TIMEOUT)
            .await?
            .into_result()?;

        let producer = KafkaEventPublisher::new(&ProducerConfig {
            base: base.clone(),
            ..ProducerConfig::new(brokers)
        })?;
        let admin = KafkaAdmin::new(&base)?;

        info!(
            brokers,
            broker_count = health.broker_count,
            latency_ms = health.latency_ms,
            "Connected to Kafka"
        );

        Ok(Self {
            base,
            producer,
            admin,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::broker("Kafka adapter is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for KafkaBroker {
    async fn publish_raw(
        &self,
        channel: Channel,
        key: Option<&str>,
        payload: &[u8],
    ) -> AppResult<()> {
        self.ensure_open()?;
        self.producer.publish_raw(channel, key, payload).await
    }
}

#[async_trait]
impl EventSubscriber for KafkaBroker {
    async fn subscribe(&self, channel: Channel, group: &str) -> AppResult<Box<dyn Subscription>> {
        self.ensure_open()?;
        if channel.transport() != Transport::Log {
            return Err(AppError::validation(format!(
                "{} is not a log topic",
                channel
            )));
        }

        let mut config = ConsumerConfig::new(self.base.brokers.clone(), group);
        if let Some(client_id) = &self.base.client_id {
            config = config.with_client_id(format!("{}-{}", client_id, channel));
        }

        Ok(Box::new(KafkaSubscription::new(&config, channel)?))
    }
}

#[async_trait]
impl BrokerLifecycle for KafkaBroker {
    fn transport(&self) -> Transport {
        Transport::Log
    }

    async fn declare_topology(&self) -> AppResult<()> {
        let topics: Vec<TopicConfig> = Topology::log_topics()
            .map(|channel| TopicConfig::single(channel.name()))
            .collect();

        self.admin.create_topics(&topics).await?;
        info!(count = topics.len(), "Kafka topics declared");
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.producer.flush();
        info!("Kafka adapter closed");
        Ok(())
    }
}
