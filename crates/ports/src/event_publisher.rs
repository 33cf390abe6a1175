//! Event Publisher / Subscriber trait 定义

use async_trait::async_trait;
use relay_errors::AppResult;
use relay_event_core::Channel;

/// 事件发布者 trait
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// 发布已编码的消息
    ///
    /// `key` 仅日志流使用（决定分区），队列忽略。
    async fn publish_raw(&self, channel: Channel, key: Option<&str>, payload: &[u8])
    -> AppResult<()>;
}

/// 订阅收到的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub channel: Channel,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl ReceivedMessage {
    pub fn new(channel: Channel, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel,
            key: None,
            payload: payload.into(),
        }
    }
}

/// 一个消费循环独占的订阅句柄
#[async_trait]
pub trait Subscription: Send {
    /// 挂起直到下一条消息到达
    ///
    /// 单条接收失败返回 `Some(Err(_))`，订阅流结束返回 `None`。
    async fn next(&mut self) -> Option<AppResult<ReceivedMessage>>;
}

/// 事件订阅者 trait
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// 订阅固定通道；日志流按 `group` 记录消费位点，队列忽略 `group`
    async fn subscribe(&self, channel: Channel, group: &str) -> AppResult<Box<dyn Subscription>>;
}
