//! PostgreSQL 连接管理

use relay_errors::{AppError, AppResult};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// PostgreSQL 连接池配置
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    /// 上报给服务端的 `application_name`，便于在 `pg_stat_activity` 中辨认
    pub application_name: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            application_name: "item-relay".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    fn connect_options(&self) -> AppResult<PgConnectOptions> {
        let options = self
            .url
            .parse::<PgConnectOptions>()
            .map_err(|e| AppError::config(format!("Invalid database URL: {}", e)))?;
        Ok(options.application_name(&self.application_name))
    }
}

/// 创建记录存储连接池
///
/// 连接失败即返回错误，由调用方决定是否终止启动。
pub async fn create_pool(config: &PostgresConfig) -> AppResult<PgPool> {
    let options = config.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database(format!("Failed to connect record store: {}", e)))?;

    info!(
        application_name = %config.application_name,
        max_connections = config.max_connections,
        "Record store pool created"
    );
    Ok(pool)
}

/// 检查数据库连接
pub async fn check_connection(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::database(format!("Database health check failed: {}", e)))?;
    Ok(())
}
