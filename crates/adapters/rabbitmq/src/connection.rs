//! AMQP 连接与队列声明

use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel as AmqpChannel, Connection, ConnectionProperties};
use relay_errors::{AppError, AppResult};
use tracing::debug;

/// 队列参数
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueConfig {
    /// 持久、非独占、不自动删除
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            exclusive: false,
            auto_delete: false,
        }
    }

    fn options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            durable: self.durable,
            exclusive: self.exclusive,
            auto_delete: self.auto_delete,
            ..QueueDeclareOptions::default()
        }
    }
}

/// 建立连接，失败即返回错误
pub async fn connect(uri: &str, connection_name: &str) -> AppResult<Connection> {
    let properties = ConnectionProperties::default().with_connection_name(connection_name.into());

    Connection::connect(uri, properties)
        .await
        .map_err(|e| AppError::broker(format!("Failed to connect to RabbitMQ: {}", e)))
}

pub async fn open_channel(connection: &Connection) -> AppResult<AmqpChannel> {
    connection
        .create_channel()
        .await
        .map_err(|e| AppError::broker(format!("Failed to create channel: {}", e)))
}

/// 声明队列，参数一致时可重复调用
pub async fn declare_queue(channel: &AmqpChannel, queue: &QueueConfig) -> AppResult<()> {
    let declared = channel
        .queue_declare(&queue.name, queue.options(), FieldTable::default())
        .await
        .map_err(|e| {
            AppError::broker(format!("Failed to declare queue {}: {}", queue.name, e))
        })?;

    debug!(
        queue = %queue.name,
        messages = declared.message_count(),
        consumers = declared.consumer_count(),
        "Queue declared"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_queue_options() {
        let options = QueueConfig::durable("items_queue").options();
        assert!(options.durable);
        assert!(!options.exclusive);
        assert!(!options.auto_delete);
        assert!(!options.passive);
    }
}
