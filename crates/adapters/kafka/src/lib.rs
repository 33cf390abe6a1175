//! adapter-kafka - Kafka 日志流适配器
//!
//! - 消息生产（按记录 ID 作 key）
//! - 消费组订阅（自动提交位点）
//! - Topic 声明
//! - 连通性检查

mod admin;
mod broker;
mod config;
mod consumer;
mod health;
mod producer;

pub use admin::*;
pub use broker::*;
pub use config::*;
pub use consumer::*;
pub use health::*;
pub use producer::*;
