//! 重试与退避
//!
//! 消费循环在订阅中断后重新订阅时使用；启动阶段的连接不走这里。

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 初始延迟
    pub initial_delay: Duration,
    /// 最大延迟
    pub max_delay: Duration,
    /// 退避乘数
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// 第 n 次失败后的等待时间（n 从 0 开始），不超过 `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = (delay_ms as u64).min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// 重试失败的原因
#[derive(Debug)]
pub enum RetryError<E> {
    /// 所有尝试都失败，携带最后一次的错误
    Exhausted(E),
    /// 等待期间收到取消信号
    Cancelled,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted(e) => write!(f, "retries exhausted: {}", e),
            Self::Cancelled => f.write_str("retry cancelled"),
        }
    }
}

/// 带指数退避的重试，可被取消
///
/// 取消信号在每次等待与每次尝试期间都会被检查。
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            outcome = operation() => outcome,
        };

        let e = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if attempt + 1 >= attempts {
            warn!(
                operation = operation_name,
                attempt = attempt + 1,
                max_attempts = attempts,
                error = %e,
                "Operation failed, no more retries"
            );
            return Err(RetryError::Exhausted(e));
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts = attempts,
            error = %e,
            delay_ms = delay.as_millis() as u64,
            "Operation failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(5), Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let cancel = CancellationToken::new();
        let result: Result<i32, RetryError<&str>> =
            with_retry(&fast(), "test", &cancel, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let cancel = CancellationToken::new();
        let counter = AtomicU32::new(0);

        let result: Result<i32, RetryError<&str>> = with_retry(&fast(), "test", &cancel, || {
            let count = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("temporary error")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let cancel = CancellationToken::new();
        let counter = AtomicU32::new(0);

        let result: Result<i32, RetryError<&str>> = with_retry(&fast(), "test", &cancel, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent error") }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted("permanent error"))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_cancelled_while_waiting() {
        let cancel = CancellationToken::new();
        let config = RetryConfig::new(10, Duration::from_secs(60), Duration::from_secs(60));
        let counter = AtomicU32::new(0);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<i32, RetryError<&str>> = with_retry(&config, "test", &cancel, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new(5, Duration::from_millis(100), Duration::from_secs(5));

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }
}
