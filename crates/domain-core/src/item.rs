//! 商品记录

use chrono::{DateTime, Utc};
use relay_common::ItemId;
use relay_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 存储中的商品记录，线上字段名沿用 `_id` / `createdAt` / `updatedAt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// 由创建请求生成记录，ID 与时间戳在此分配
    pub fn create(input: NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            category: input.category,
            created_at: now,
            updated_at: now,
        }
    }

    /// 名称、描述、分类中任一字段包含 `query`（不区分大小写）
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        [&self.name, &self.description, &self.category]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// 创建请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
}

impl NewItem {
    pub fn validate(&self) -> AppResult<()> {
        validate_name(&self.name)?;
        validate_price(self.price)
    }
}

/// 部分更新请求，缺省字段保持不变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
}

impl ItemChanges {
    pub fn validate(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
    }

    /// 应用到记录上并刷新 `updated_at`
    pub fn apply_to(self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            item.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        item.updated_at = now;
    }
}

/// 分类统计，线上字段名 `_id` 为分类名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    #[serde(rename = "_id")]
    pub category: String,
    pub count: u64,
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    Ok(())
}

fn validate_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(())
}
