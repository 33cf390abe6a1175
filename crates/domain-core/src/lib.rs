//! relay-domain-core - 记录存储中的领域类型
//!
//! 商品记录及其创建、修改输入

mod item;

pub use item::*;

pub use relay_common::ItemId;
