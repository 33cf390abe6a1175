//! PostgreSQL 迁移管理模块
//!
//! 启动时按版本顺序应用记录表结构

use std::collections::HashSet;

use relay_errors::{AppError, AppResult};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

/// 迁移定义
#[derive(Debug, Clone)]
pub struct Migration {
    /// 版本号
    pub version: i64,
    /// 名称
    pub name: String,
    /// 升级 SQL
    pub up_sql: String,
    /// 校验和
    pub checksum: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        let up_sql = up_sql.into();
        let checksum = Self::calculate_checksum(&up_sql);
        Self {
            version,
            name: name.into(),
            up_sql,
            checksum,
        }
    }

    /// SHA-256 十六进制摘要，跨编译器版本稳定
    fn calculate_checksum(sql: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// 记录表的迁移集合
pub fn item_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "create_items",
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
                category TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_items_category ON items (category);
            CREATE INDEX IF NOT EXISTS idx_items_created_at ON items (created_at DESC);
            "#,
        ),
    ]
}

/// 迁移管理器
pub struct MigrationManager {
    pool: PgPool,
    table_name: String,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table_name: "_migrations".to_string(),
        }
    }

    /// 初始化迁移表
    pub async fn init(&self) -> AppResult<()> {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#,
            self.table_name
        );

        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create migration table: {}", e)))?;

        Ok(())
    }

    async fn applied_versions(&self) -> AppResult<Vec<(i64, String)>> {
        let sql = format!("SELECT version, checksum FROM {}", self.table_name);

        sqlx::query_as::<_, (i64, String)>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get migrations: {}", e)))
    }

    /// 在单个事务中应用迁移并登记
    pub async fn apply(&self, migration: &Migration) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::raw_sql(&migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::database(format!(
                    "Failed to apply migration {}: {}",
                    migration.version, e
                ))
            })?;

        let insert_sql = format!(
            "INSERT INTO {} (version, name, checksum) VALUES ($1, $2, $3)",
            self.table_name
        );
        sqlx::query(&insert_sql)
            .bind(migration.version)
            .bind(&migration.name)
            .bind(&migration.checksum)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to record migration: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit migration: {}", e)))?;

        info!(
            version = migration.version,
            name = %migration.name,
            "Migration applied"
        );

        Ok(())
    }

    /// 应用所有待处理的迁移；已应用迁移的内容被修改时报错
    pub async fn migrate(&self, migrations: &[Migration]) -> AppResult<MigrationResult> {
        self.init().await?;

        let applied = self.applied_versions().await?;
        let applied_versions: HashSet<i64> = applied.iter().map(|(v, _)| *v).collect();

        let mut result = MigrationResult::default();

        let mut sorted: Vec<_> = migrations.iter().collect();
        sorted.sort_by_key(|m| m.version);

        for migration in sorted {
            if applied_versions.contains(&migration.version) {
                let modified = applied
                    .iter()
                    .any(|(v, checksum)| *v == migration.version && *checksum != migration.checksum);
                if modified {
                    return Err(AppError::database(format!(
                        "Migration {} ({}) has been modified after it was applied",
                        migration.version, migration.name
                    )));
                }
                result.skipped.push(migration.version);
                continue;
            }

            self.apply(migration).await?;
            result.applied.push(migration.version);
        }

        Ok(result)
    }
}

/// 迁移结果
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    /// 已应用的迁移版本
    pub applied: Vec<i64>,
    /// 跳过的迁移版本
    pub skipped: Vec<i64>,
}

impl MigrationResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let sql = "CREATE TABLE test (id INT)";
        let m1 = Migration::new(1, "test", sql);
        let m2 = Migration::new(1, "test", sql);
        let m3 = Migration::new(1, "test", "CREATE TABLE test (id BIGINT)");

        assert_eq!(m1.checksum, m2.checksum);
        assert_ne!(m1.checksum, m3.checksum);
    }

    #[test]
    fn test_checksum_is_stable_sha256() {
        let m = Migration::new(1, "test", "CREATE TABLE test (id INT)");

        assert_eq!(
            m.checksum,
            "392b93b9e856f3e5540956c83a427732f1888cff687a430b5db44765f39748c4"
        );
        // 与 _migrations.checksum VARCHAR(64) 对齐
        assert_eq!(m.checksum.len(), 64);
    }

    #[test]
    fn test_item_migrations_are_ordered() {
        let migrations = item_migrations();
        assert!(!migrations.is_empty());
        assert!(migrations.windows(2).all(|w| w[0].version < w[1].version));
        assert!(migrations[0].up_sql.contains("CREATE TABLE IF NOT EXISTS items"));
    }
}
