//! relay-telemetry - 可观测性库

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 安装 Prometheus recorder，返回用于渲染 `/metrics` 的句柄
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// 消息流向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Published,
    Consumed,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Published => "published",
            Direction::Consumed => "consumed",
        }
    }
}

/// 消息处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }
}

/// 记录一条经过中继的消息
pub fn record_message(channel: &str, direction: Direction, outcome: Outcome) {
    let labels = [
        ("channel", channel.to_string()),
        ("direction", direction.as_str().to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];

    counter!("relay_messages_total", &labels).increment(1);
}
