//! ports - 抽象 trait 层
//!
//! 定义消息代理与记录存储的抽象接口

mod broker;
mod event_publisher;
mod repository;

pub use broker::*;
pub use event_publisher::*;
pub use repository::*;
