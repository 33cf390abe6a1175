//! item-service - 商品记录 HTTP 接口
//!
//! 写入成功后通过中继发布者发出领域事件

pub mod api;
pub mod error;

pub use api::router;
