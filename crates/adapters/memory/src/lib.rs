//! relay-adapter-memory - 进程内适配器
//!
//! 本地运行与测试使用的消息代理和记录存储

mod broker;
mod item_repository;

pub use broker::*;
pub use item_repository::*;
