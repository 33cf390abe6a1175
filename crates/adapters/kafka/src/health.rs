//! Kafka 健康检查模块
//!
//! 通过拉取集群元数据检查 broker 连通性

use std::time::{Duration, Instant};

use rdkafka::consumer::{BaseConsumer, Consumer};
use relay_errors::{AppError, AppResult};
use tracing::{debug, error};

use crate::config::{KafkaConfig, client_config};

/// 健康检查结果
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// 是否健康
    pub healthy: bool,
    /// 延迟（毫秒）
    pub latency_ms: Option<u64>,
    /// 错误信息
    pub error: Option<String>,
    /// Broker 数量
    pub broker_count: usize,
}

impl HealthCheckResult {
    /// 不健康时转为错误
    pub fn into_result(self) -> AppResult<Self> {
        if self.healthy {
            return Ok(self);
        }
        Err(AppError::broker(format!(
            "Kafka unreachable: {}",
            self.error.as_deref().unwrap_or("no brokers in metadata")
        )))
    }
}

/// Kafka 健康检查器
pub struct KafkaHealthChecker {
    consumer: BaseConsumer,
    timeout: Duration,
}

impl KafkaHealthChecker {
    pub fn new(config: &KafkaConfig) -> AppResult<Self> {
        let consumer: BaseConsumer = client_config(config.to_client_config_entries())
            .create()
            .map_err(|e| AppError::broker(format!("Failed to create health checker: {}", e)))?;

        Ok(Self {
            consumer,
            timeout: Duration::from_secs(10),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 执行健康检查（阻塞）
    pub fn check(&self) -> HealthCheckResult {
        let start = Instant::now();

        match self.consumer.fetch_metadata(None, self.timeout) {
            Ok(metadata) => {
                let latency = start.elapsed().as_millis() as u64;
                let broker_count = metadata.brokers().len();

                debug!(
                    latency_ms = latency,
                    brokers = broker_count,
                    "Kafka health check passed"
                );

                HealthCheckResult {
                    healthy: broker_count > 0,
                    latency_ms: Some(latency),
                    error: None,
                    broker_count,
                }
            }
            Err(e) => {
                error!(error = %e, "Kafka health check failed");
                HealthCheckResult {
                    healthy: false,
                    latency_ms: None,
                    error: Some(e.to_string()),
                    broker_count: 0,
                }
            }
        }
    }
}

/// 异步健康检查（在后台线程执行）
pub async fn check_kafka_health(config: KafkaConfig, timeout: Duration) -> AppResult<HealthCheckResult> {
    tokio::task::spawn_blocking(move || {
        let checker = KafkaHealthChecker::new(&config)?.with_timeout(timeout);
        Ok(checker.check())
    })
    .await
    .map_err(|e| AppError::internal(format!("Health check task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_result_is_broker_error() {
        let result = HealthCheckResult {
            healthy: false,
            latency_ms: None,
            error: Some("timed out".to_string()),
            broker_count: 0,
        };

        let err = result.into_result().unwrap_err();
        assert!(matches!(err, AppError::Broker(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    #[ignore] // 需要 Kafka 实例
    async fn test_health_checker() {
        let result = check_kafka_health(KafkaConfig::new("localhost:9092"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.healthy);
    }
}
