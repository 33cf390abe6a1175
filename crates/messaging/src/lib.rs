//! relay-messaging - 事件中继
//!
//! - 发布者：一次变更同时发往日志流与队列，互不影响
//! - 消费循环：按通道拉取、解码、分派，派生回执
//! - 处理器：领域事件、队列动作、通知

mod consumer;
mod handlers;
mod publisher;

pub use consumer::*;
pub use handlers::*;
pub use publisher::*;
