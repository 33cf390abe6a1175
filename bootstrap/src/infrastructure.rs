//! 基础设施资源管理
//!
//! 记录存储与两个消息代理的连接，由 bootstrap 统一创建和关闭

use std::sync::Arc;

use relay_adapter_kafka::KafkaBroker;
use relay_adapter_postgres::{
    MigrationManager, PostgresConfig, PostgresItemRepository, create_pool, item_migrations,
};
use relay_adapter_rabbitmq::RabbitMqBroker;
use relay_config::AppConfig;
use relay_errors::AppResult;
use relay_event_core::Transport;
use relay_ports::{BrokerHandle, ItemRepository};
use secrecy::ExposeSecret;
use tracing::{error, info};

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    store: Arc<dyn ItemRepository>,
    log: BrokerHandle,
    queue: BrokerHandle,
}

impl Infrastructure {
    /// 依次连接记录存储、日志流、队列
    ///
    /// 任一连接失败即返回错误，不做重试；已建立的连接会先关闭。
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let pg_config = PostgresConfig::new(config.database.url.expose_secret())
            .with_max_connections(config.database.max_connections)
            .with_application_name(&config.service_name);
        let pool = create_pool(&pg_config).await?;
        let store: Arc<dyn ItemRepository> = Arc::new(PostgresItemRepository::new(pool.clone()));

        if let Err(e) = MigrationManager::new(pool)
            .migrate(&item_migrations())
            .await
        {
            store.close().await;
            return Err(e);
        }
        info!("Record store ready");

        let log = match KafkaBroker::connect(&config.kafka.brokers, &config.service_name).await {
            Ok(broker) => BrokerHandle::new(Arc::new(broker)),
            Err(e) => {
                store.close().await;
                return Err(e);
            }
        };
        info!(brokers = %config.kafka.brokers, "Log stream connected");

        let queue =
            match RabbitMqBroker::connect(config.rabbitmq.uri.expose_secret(), &config.service_name)
                .await
            {
                Ok(broker) => BrokerHandle::new(Arc::new(broker)),
                Err(e) => {
                    close_broker(&log).await;
                    store.close().await;
                    return Err(e);
                }
            };
        info!("Queue broker connected");

        Ok(Self::from_parts(config, store, log, queue))
    }

    /// 用已建立的连接组装，测试与本地运行时注入内存适配器
    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn ItemRepository>,
        log: BrokerHandle,
        queue: BrokerHandle,
    ) -> Self {
        Self {
            config,
            store,
            log,
            queue,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ItemRepository> {
        self.store.clone()
    }

    pub fn log(&self) -> &BrokerHandle {
        &self.log
    }

    pub fn queue(&self) -> &BrokerHandle {
        &self.queue
    }

    pub fn broker(&self, transport: Transport) -> &BrokerHandle {
        match transport {
            Transport::Log => &self.log,
            Transport::Queue => &self.queue,
        }
    }

    /// 关闭顺序：队列 → 日志流 → 记录存储
    pub async fn close(&self) {
        close_broker(&self.queue).await;
        close_broker(&self.log).await;
        self.store.close().await;
        info!("Infrastructure closed");
    }
}

async fn close_broker(broker: &BrokerHandle) {
    if let Err(e) = broker.lifecycle.close().await {
        error!(transport = ?broker.transport(), error = %e, "Failed to close broker");
    }
}
