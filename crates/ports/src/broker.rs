//! 消息代理生命周期与句柄

use std::sync::Arc;

use async_trait::async_trait;
use relay_errors::AppResult;
use relay_event_core::Transport;

use crate::{EventPublisher, EventSubscriber};

/// 代理连接生命周期
#[async_trait]
pub trait BrokerLifecycle: Send + Sync {
    fn transport(&self) -> Transport;

    /// 声明固定拓扑，可重复调用
    async fn declare_topology(&self) -> AppResult<()>;

    /// 关闭连接；须在该代理的所有消费循环停止后调用
    async fn close(&self) -> AppResult<()>;
}

/// 注入到各组件的代理句柄
#[derive(Clone)]
pub struct BrokerHandle {
    pub publisher: Arc<dyn EventPublisher>,
    pub subscriber: Arc<dyn EventSubscriber>,
    pub lifecycle: Arc<dyn BrokerLifecycle>,
}

impl BrokerHandle {
    pub fn new<B>(broker: Arc<B>) -> Self
    where
        B: EventPublisher + EventSubscriber + BrokerLifecycle + 'static,
    {
        Self {
            publisher: broker.clone(),
            subscriber: broker.clone(),
            lifecycle: broker,
        }
    }

    pub fn transport(&self) -> Transport {
        self.lifecycle.transport()
    }
}

impl std::fmt::Debug for BrokerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerHandle")
            .field("transport", &self.transport())
            .finish()
    }
}
