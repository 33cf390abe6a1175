//! Kafka Admin 模块
//!
//! 启动时声明固定拓扑中的 topic

use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::RDKafkaErrorCode;
use relay_errors::{AppError, AppResult};
use tracing::{debug, error, info};

use crate::config::{KafkaConfig, client_config};

/// Topic 配置
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Topic 名称
    pub name: String,
    /// 分区数量
    pub num_partitions: i32,
    /// 副本因子
    pub replication_factor: i32,
}

impl TopicConfig {
    pub fn new(name: impl Into<String>, num_partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            num_partitions,
            replication_factor,
        }
    }

    /// 单分区单副本，本地开发集群可用
    pub fn single(name: impl Into<String>) -> Self {
        Self::new(name, 1, 1)
    }
}

/// Kafka Admin 客户端
pub struct KafkaAdmin {
    admin: AdminClient<DefaultClientContext>,
    timeout: Duration,
}

impl KafkaAdmin {
    pub fn new(config: &KafkaConfig) -> AppResult<Self> {
        let admin: AdminClient<DefaultClientContext> =
            client_config(config.to_client_config_entries())
                .create()
                .map_err(|e| AppError::broker(format!("Failed to create admin client: {}", e)))?;

        Ok(Self {
            admin,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 创建 Topics，已存在的视为成功
    pub async fn create_topics(&self, topics: &[TopicConfig]) -> AppResult<()> {
        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|t| {
                NewTopic::new(
                    &t.name,
                    t.num_partitions,
                    TopicReplication::Fixed(t.replication_factor),
                )
            })
            .collect();

        let opts = AdminOptions::new().operation_timeout(Some(self.timeout));

        let results = self
            .admin
            .create_topics(&new_topics, &opts)
            .await
            .map_err(|e| AppError::broker(format!("Failed to create topics: {}", e)))?;

        for result in results {
            match result {
                Ok(name) => {
                    info!(topic = %name, "Topic created");
                }
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!(topic = %name, "Topic already exists");
                }
                Err((name, err)) => {
                    error!(topic = %name, error = ?err, "Failed to create topic");
                    return Err(AppError::broker(format!(
                        "Failed to create topic {}: {:?}",
                        name, err
                    )));
                }
            }
        }

        Ok(())
    }
}
