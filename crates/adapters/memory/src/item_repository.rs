//! 内存商品记录存储

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use relay_common::ItemId;
use relay_domain_core::{CategoryCount, Item, ItemChanges, NewItem};
use relay_errors::{AppError, AppResult};
use relay_ports::ItemRepository;
use tokio::sync::RwLock;

/// 内存记录存储，可模拟写入失败
#[derive(Clone, Default)]
pub struct InMemoryItemRepository {
    items: Arc<RwLock<HashMap<ItemId, Item>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储不可用：所有操作返回数据库错误
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::Acquire) {
            return Err(AppError::database("in-memory store unavailable"));
        }
        Ok(())
    }

    fn newest_first(mut items: Vec<Item>) -> Vec<Item> {
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });
        items
    }
}

#[async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn list(&self) -> AppResult<Vec<Item>> {
        self.check()?;
        let items = self.items.read().await.values().cloned().collect();
        Ok(Self::newest_first(items))
    }

    async fn find_by_id(&self, id: &ItemId) -> AppResult<Option<Item>> {
        self.check()?;
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn create(&self, input: NewItem) -> AppResult<Item> {
        self.check()?;
        let item = Item::create(input, Utc::now());
        self.items.write().await.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update(&self, id: &ItemId, changes: ItemChanges) -> AppResult<Option<Item>> {
        self.check()?;
        let mut items = self.items.write().await;
        Ok(items.get_mut(id).map(|item| {
            changes.apply_to(item, Utc::now());
            item.clone()
        }))
    }

    async fn delete(&self, id: &ItemId) -> AppResult<bool> {
        self.check()?;
        Ok(self.items.write().await.remove(id).is_some())
    }

    async fn search(&self, query: &str) -> AppResult<Vec<Item>> {
        self.check()?;
        let items = self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.matches(query))
            .cloned()
            .collect();
        Ok(Self::newest_first(items))
    }

    async fn category_stats(&self) -> AppResult<Vec<CategoryCount>> {
        self.check()?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for item in self.items.read().await.values() {
            *counts.entry(item.category.clone()).or_default() += 1;
        }

        let mut stats: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        Ok(stats)
    }

    async fn count(&self) -> AppResult<u64> {
        self.check()?;
        Ok(self.items.read().await.len() as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        self.check()
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(name: &str, category: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            description: String::new(),
            price: 1.0,
            category: category.to_string(),
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let repo = InMemoryItemRepository::new();
        let item = repo.create(new_item("Widget", "Tools")).await.unwrap();

        assert_eq!(repo.find_by_id(&item.id).await.unwrap(), Some(item.clone()));

        let updated = repo
            .update(
                &item.id,
                ItemChanges {
                    name: Some("Gadget".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Gadget");

        assert!(repo.delete(&item.id).await.unwrap());
        assert!(!repo.delete(&item.id).await.unwrap());
        assert!(repo.update(&item.id, ItemChanges::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_and_stats() {
        let repo = InMemoryItemRepository::new();
        repo.create(new_item("Widget", "Tools")).await.unwrap();
        repo.create(new_item("Hammer", "Tools")).await.unwrap();
        repo.create(new_item("Rose", "Garden")).await.unwrap();

        assert_eq!(repo.search("TOOL").await.unwrap().len(), 2);
        assert_eq!(repo.count().await.unwrap(), 3);

        let stats = repo.category_stats().await.unwrap();
        assert_eq!(stats[0].category, "Tools");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[1].category, "Garden");
    }

    #[tokio::test]
    async fn test_failing_store() {
        let repo = InMemoryItemRepository::new();
        repo.set_failing(true);

        let err = repo.create(new_item("Widget", "Tools")).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        repo.set_failing(false);
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
