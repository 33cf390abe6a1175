//! Repository trait 定义

use async_trait::async_trait;
use relay_common::ItemId;
use relay_domain_core::{CategoryCount, Item, ItemChanges, NewItem};
use relay_errors::AppResult;

/// 商品记录存储
///
/// 变更方法只在写入成功后返回记录；记录不存在时返回 `None` / `false`。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// 全部记录，按创建时间倒序
    async fn list(&self) -> AppResult<Vec<Item>>;

    async fn find_by_id(&self, id: &ItemId) -> AppResult<Option<Item>>;

    async fn create(&self, input: NewItem) -> AppResult<Item>;

    async fn update(&self, id: &ItemId, changes: ItemChanges) -> AppResult<Option<Item>>;

    async fn delete(&self, id: &ItemId) -> AppResult<bool>;

    /// 名称、描述、分类模糊匹配（不区分大小写）
    async fn search(&self, query: &str) -> AppResult<Vec<Item>>;

    /// 每个分类的记录数，按数量倒序
    async fn category_stats(&self) -> AppResult<Vec<CategoryCount>>;

    async fn count(&self) -> AppResult<u64>;

    /// 存储连通性检查
    async fn ping(&self) -> AppResult<()>;

    /// 释放连接
    async fn close(&self);
}
