//! Message Handler 定义

use async_trait::async_trait;
use relay_errors::AppResult;

use crate::{Channel, RelayMessage};

/// 消费循环按通道分派的处理器
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// 处理器负责的入站通道
    fn channel(&self) -> Channel;

    /// 处理一条已解码的消息
    async fn handle(&self, message: RelayMessage) -> AppResult<()>;
}
