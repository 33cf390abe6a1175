//! 中继协调器
//!
//! 声明拓扑、为每个入站通道启动消费循环，关闭时按序回收

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use relay_common::RetryConfig;
use relay_config::AppConfig;
use relay_errors::{AppError, AppResult};
use relay_event_core::{Channel, MessageHandler, Topology};
use relay_messaging::{
    ConsumerLoop, DomainEventHandler, ItemActionHandler, LogNotifier, LoopHandle, LoopState,
    LoopStatsSnapshot, NotificationHandler, Notifier, RelayPublisher,
};
use relay_ports::ItemRepository;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infrastructure::Infrastructure;

/// 协调器设置
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// 日志流消费组
    pub consumer_group: String,
    /// 写入派生回执的 `processed_by` / `source`
    pub service_name: String,
    /// 订阅中断后的重新订阅策略
    pub retry: RetryConfig,
    /// 关闭时等待每个消费循环退出的上限
    pub join_timeout: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            consumer_group: config.kafka.consumer_group.clone(),
            service_name: config.service_name.clone(),
            retry: RetryConfig::default(),
            join_timeout: Duration::from_secs(config.server.shutdown_grace_secs),
        }
    }
}

/// 各消费循环状态的只读视图
#[derive(Clone, Default)]
pub struct ConsumerStatus {
    loops: Vec<(Channel, watch::Receiver<LoopState>)>,
}

impl ConsumerStatus {
    pub fn states(&self) -> BTreeMap<&'static str, LoopState> {
        self.loops
            .iter()
            .map(|(channel, state)| (channel.name(), *state.borrow()))
            .collect()
    }

    pub fn all_consuming(&self) -> bool {
        self.loops
            .iter()
            .all(|(_, state)| *state.borrow() == LoopState::Consuming)
    }
}

/// 中继协调器
pub struct RelayCoordinator {
    infra: Infrastructure,
    settings: RelaySettings,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
    loops: Vec<LoopHandle>,
}

impl RelayCoordinator {
    /// 声明拓扑并启动全部消费循环，通知以日志模拟投递
    pub async fn start(infra: Infrastructure, settings: RelaySettings) -> AppResult<Self> {
        Self::start_with_notifier(infra, settings, Arc::new(LogNotifier)).await
    }

    /// 任一步失败都会回收已启动的循环并关闭基础设施
    pub async fn start_with_notifier(
        infra: Infrastructure,
        settings: RelaySettings,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let mut coordinator = Self {
            infra,
            settings,
            notifier,
            cancel: CancellationToken::new(),
            loops: Vec::new(),
        };

        if let Err(e) = coordinator.declare_topology().await {
            coordinator.shutdown().await;
            return Err(e);
        }

        for channel in Topology::inbound() {
            match coordinator.start_loop(channel).await {
                Ok(handle) => coordinator.loops.push(handle),
                Err(e) => {
                    coordinator.shutdown().await;
                    return Err(e);
                }
            }
        }

        info!(loops = coordinator.loops.len(), "Relay coordinator started");
        Ok(coordinator)
    }

    async fn declare_topology(&self) -> AppResult<()> {
        self.infra.log().lifecycle.declare_topology().await?;
        self.infra.queue().lifecycle.declare_topology().await?;
        info!("Topology declared");
        Ok(())
    }

    async fn start_loop(&self, channel: Channel) -> AppResult<LoopHandle> {
        let handler = self.handler_for(channel).ok_or_else(|| {
            AppError::config(format!("no handler registered for {}", channel))
        })?;
        let subscriber = self.infra.broker(channel.transport()).subscriber.clone();
        ConsumerLoop::new(subscriber, handler, &self.settings.consumer_group)
            .with_retry(self.settings.retry.clone())
            .start(self.cancel.child_token())
            .await
    }

    fn handler_for(&self, channel: Channel) -> Option<Arc<dyn MessageHandler>> {
        let name = self.settings.service_name.clone();
        let log_acks = self.infra.log().publisher.clone();
        let queue_acks = self.infra.queue().publisher.clone();

        let handler: Arc<dyn MessageHandler> = match channel {
            Channel::DomainEvents => Arc::new(DomainEventHandler::new(log_acks, name)),
            Channel::ItemActions => Arc::new(ItemActionHandler::new(queue_acks, name)),
            Channel::Notifications => {
                Arc::new(NotificationHandler::new(self.notifier.clone(), queue_acks, name))
            }
            Channel::DerivedAcks | Channel::DerivedQueueAcks => return None,
        };
        Some(handler)
    }

    /// 面向 HTTP 层的发布者
    pub fn publisher(&self) -> RelayPublisher {
        RelayPublisher::new(
            self.infra.log().publisher.clone(),
            self.infra.queue().publisher.clone(),
            self.settings.service_name.clone(),
        )
    }

    pub fn store(&self) -> Arc<dyn ItemRepository> {
        self.infra.store()
    }

    pub fn config(&self) -> &AppConfig {
        self.infra.config()
    }

    pub fn consumers(&self) -> ConsumerStatus {
        ConsumerStatus {
            loops: self
                .loops
                .iter()
                .map(|handle| (handle.channel(), handle.subscribe_state()))
                .collect(),
        }
    }

    pub fn stats(&self) -> BTreeMap<&'static str, LoopStatsSnapshot> {
        self.loops
            .iter()
            .map(|handle| (handle.channel().name(), handle.stats()))
            .collect()
    }

    /// 通知所有循环停止、限时等待退出，再关闭基础设施
    pub async fn shutdown(self) {
        info!("Stopping consumer loops");
        self.cancel.cancel();

        let timeout = self.settings.join_timeout;
        let joined = futures::future::join_all(
            self.loops.into_iter().map(|handle| handle.join(timeout)),
        )
        .await;

        let stuck = joined.iter().filter(|stopped| !**stopped).count();
        if stuck > 0 {
            warn!(stuck, "Some consumer loops did not stop cleanly");
        }

        self.infra.close().await;
        info!("Relay coordinator stopped");
    }
}
