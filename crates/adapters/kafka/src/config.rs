//! Kafka 配置模块
//!
//! 各客户端配置统一转换为 rdkafka `ClientConfig` 配置项

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;

/// Kafka 基础配置
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Broker 地址列表
    pub brokers: String,
    /// 客户端 ID
    pub client_id: Option<String>,
    /// 额外配置
    pub extra: HashMap<String, String>,
}

impl KafkaConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            client_id: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// 转换为 rdkafka ClientConfig 的配置项
    pub fn to_client_config_entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![("bootstrap.servers".to_string(), self.brokers.clone())];

        if let Some(client_id) = &self.client_id {
            entries.push(("client.id".to_string(), client_id.clone()));
        }

        for (key, value) in &self.extra {
            entries.push((key.clone(), value.clone()));
        }

        entries
    }
}

/// Producer 配置
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// 基础配置
    pub base: KafkaConfig,
    /// 确认模式：0=不等待，1=leader确认，-1=所有副本确认
    pub acks: i32,
    /// 延迟发送时间（用于批量）
    pub linger_ms: u64,
    /// 单条消息投递超时，超时后 send 返回错误
    pub message_timeout: Duration,
    /// 关闭时等待缓冲区刷出的时间
    pub flush_timeout: Duration,
}

impl ProducerConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            base: KafkaConfig::new(brokers),
            acks: 1,
            linger_ms: 5,
            message_timeout: Duration::from_secs(10),
            flush_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.base = self.base.with_client_id(client_id);
        self
    }

    pub fn with_acks(mut self, acks: i32) -> Self {
        self.acks = acks;
        self
    }

    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    /// 转换为 rdkafka ClientConfig 的配置项
    pub fn to_client_config_entries(&self) -> Vec<(String, String)> {
        let mut entries = self.base.to_client_config_entries();

        entries.push(("acks".to_string(), self.acks.to_string()));
        entries.push(("linger.ms".to_string(), self.linger_ms.to_string()));
        entries.push((
            "message.timeout.ms".to_string(),
            self.message_timeout.as_millis().to_string(),
        ));

        entries
    }
}

/// 自动偏移重置策略
#[derive(Debug, Clone, Default)]
pub enum AutoOffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl AutoOffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoOffsetReset::Earliest => "earliest",
            AutoOffsetReset::Latest => "latest",
        }
    }
}

/// Consumer 配置
///
/// 默认自动提交位点：无法解码的消息同样被越过，不会重复投递。
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// 基础配置
    pub base: KafkaConfig,
    /// 消费者组 ID
    pub group_id: String,
    /// 自动提交
    pub enable_auto_commit: bool,
    /// 自动提交间隔
    pub auto_commit_interval: Duration,
    /// 自动偏移重置策略
    pub auto_offset_reset: AutoOffsetReset,
    /// 会话超时
    pub session_timeout: Duration,
}

impl ConsumerConfig {
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            base: KafkaConfig::new(brokers),
            group_id: group_id.into(),
            enable_auto_commit: true,
            auto_commit_interval: Duration::from_secs(1),
            auto_offset_reset: AutoOffsetReset::default(),
            session_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.base = self.base.with_client_id(client_id);
        self
    }

    pub fn with_auto_offset_reset(mut self, reset: AutoOffsetReset) -> Self {
        self.auto_offset_reset = reset;
        self
    }

    /// 转换为 rdkafka ClientConfig 的配置项
    pub fn to_client_config_entries(&self) -> Vec<(String, String)> {
        let mut entries = self.base.to_client_config_entries();

        entries.push(("group.id".to_string(), self.group_id.clone()));
        entries.push((
            "enable.auto.commit".to_string(),
            self.enable_auto_commit.to_string(),
        ));
        entries.push((
            "auto.commit.interval.ms".to_string(),
            self.auto_commit_interval.as_millis().to_string(),
        ));
        entries.push((
            "auto.offset.reset".to_string(),
            self.auto_offset_reset.as_str().to_string(),
        ));
        entries.push((
            "session.timeout.ms".to_string(),
            self.session_timeout.as_millis().to_string(),
        ));

        entries
    }
}

pub(crate) fn client_config(entries: Vec<(String, String)>) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    for (key, value) in entries {
        client_config.set(key, value);
    }
    client_config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(entries: &[(String, String)], key: &str, value: &str) -> bool {
        entries.iter().any(|(k, v)| k == key && v == value)
    }

    #[test]
    fn test_kafka_config() {
        let config = KafkaConfig::new("localhost:9092").with_client_id("item-relay");

        let entries = config.to_client_config_entries();
        assert!(has(&entries, "bootstrap.servers", "localhost:9092"));
        assert!(has(&entries, "client.id", "item-relay"));
    }

    #[test]
    fn test_producer_config() {
        let config = ProducerConfig::new("localhost:9092")
            .with_acks(-1)
            .with_message_timeout(Duration::from_secs(3));

        let entries = config.to_client_config_entries();
        assert!(has(&entries, "acks", "-1"));
        assert!(has(&entries, "message.timeout.ms", "3000"));
    }

    #[test]
    fn test_consumer_config_auto_commits_from_earliest() {
        let config = ConsumerConfig::new("localhost:9092", "item-relay-group");

        let entries = config.to_client_config_entries();
        assert!(has(&entries, "group.id", "item-relay-group"));
        assert!(has(&entries, "enable.auto.commit", "true"));
        assert!(has(&entries, "auto.offset.reset", "earliest"));
    }
}
