//! 消费循环
//!
//! 每个入站通道一个后台任务：拉取、解码、分派给处理器。
//! 订阅流意外结束时按退避策略重新订阅。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use relay_common::{RetryConfig, RetryError, with_retry};
use relay_errors::{AppError, AppResult};
use relay_event_core::{Channel, MessageHandler, MessageKind, decode_expected};
use relay_ports::{EventSubscriber, ReceivedMessage, Subscription};
use relay_telemetry::{Direction, Outcome, record_message};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 消费循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Stopped,
    Connecting,
    Consuming,
    Reconnecting,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Connecting => "connecting",
            Self::Consuming => "consuming",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// 消费计数器
#[derive(Debug, Default)]
pub struct LoopStats {
    processed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    receive_errors: AtomicU64,
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatsSnapshot {
    /// 处理成功
    pub processed: u64,
    /// 解码失败被跳过
    pub skipped: u64,
    /// 处理器返回错误
    pub failed: u64,
    pub receive_errors: u64,
}

impl LoopStats {
    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 单通道消费循环
pub struct ConsumerLoop {
    subscriber: Arc<dyn EventSubscriber>,
    handler: Arc<dyn MessageHandler>,
    group: String,
    retry: RetryConfig,
}

impl ConsumerLoop {
    /// `group` 为日志流消费组；队列忽略
    pub fn new(
        subscriber: Arc<dyn EventSubscriber>,
        handler: Arc<dyn MessageHandler>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            subscriber,
            handler,
            group: group.into(),
            retry: RetryConfig::default(),
        }
    }

    /// 重新订阅的退避策略
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn channel(&self) -> Channel {
        self.handler.channel()
    }

    /// 订阅并启动后台任务
    ///
    /// 首次订阅失败直接返回错误，不重试。
    pub async fn start(self, cancel: CancellationToken) -> AppResult<LoopHandle> {
        let channel = self.channel();
        let expected = channel.inbound_kind().ok_or_else(|| {
            AppError::config(format!("{} is not an inbound channel", channel))
        })?;

        let (state, state_rx) = watch::channel(LoopState::Connecting);
        debug!(channel = %channel, group = %self.group, "Subscribing");

        let subscription = self
            .subscriber
            .subscribe(channel, &self.group)
            .await
            .inspect_err(|e| error!(channel = %channel, error = %e, "Failed to subscribe"))?;

        state.send_replace(LoopState::Consuming);
        info!(channel = %channel, group = %self.group, "Consumer loop started");

        let stats = Arc::new(LoopStats::default());
        let worker = Worker {
            consumer: self,
            channel,
            expected,
            stats: stats.clone(),
            state,
            cancel,
        };
        let task = tokio::spawn(worker.run(subscription));

        Ok(LoopHandle {
            channel,
            state: state_rx,
            stats,
            task,
        })
    }
}

struct Worker {
    consumer: ConsumerLoop,
    channel: Channel,
    expected: MessageKind,
    stats: Arc<LoopStats>,
    state: watch::Sender<LoopState>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, mut subscription: Box<dyn Subscription>) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(channel = %self.channel, "Consumer loop received shutdown signal");
                    break;
                }
                next = subscription.next() => next,
            };

            match next {
                Some(Ok(message)) => self.process(message).await,
                Some(Err(e)) => {
                    LoopStats::bump(&self.stats.receive_errors);
                    warn!(channel = %self.channel, error = %e, "Failed to receive message");
                }
                None => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    match self.resubscribe().await {
                        Some(renewed) => subscription = renewed,
                        None => break,
                    }
                }
            }
        }

        info!(channel = %self.channel, "Consumer loop stopped");
    }

    async fn resubscribe(&self) -> Option<Box<dyn Subscription>> {
        warn!(channel = %self.channel, "Subscription ended, reconnecting");
        self.state.send_replace(LoopState::Reconnecting);

        let consumer = &self.consumer;
        let result = with_retry(&consumer.retry, "resubscribe", &self.cancel, || {
            consumer.subscriber.subscribe(self.channel, &consumer.group)
        })
        .await;

        match result {
            Ok(subscription) => {
                self.state.send_replace(LoopState::Consuming);
                info!(channel = %self.channel, "Consumer loop resubscribed");
                Some(subscription)
            }
            Err(RetryError::Cancelled) => None,
            Err(RetryError::Exhausted(e)) => {
                error!(channel = %self.channel, error = %e, "Giving up on resubscription");
                None
            }
        }
    }

    async fn process(&self, message: ReceivedMessage) {
        let decoded = match decode_expected(&message.payload, self.expected) {
            Ok(decoded) => decoded,
            Err(e) => {
                LoopStats::bump(&self.stats.skipped);
                record_message(self.channel.name(), Direction::Consumed, Outcome::Skipped);
                warn!(
                    channel = %self.channel,
                    bytes = message.payload.len(),
                    error = %e,
                    "Skipping undecodable message"
                );
                return;
            }
        };

        match self.consumer.handler.handle(decoded).await {
            Ok(()) => {
                LoopStats::bump(&self.stats.processed);
                record_message(self.channel.name(), Direction::Consumed, Outcome::Ok);
            }
            Err(e) => {
                LoopStats::bump(&self.stats.failed);
                record_message(self.channel.name(), Direction::Consumed, Outcome::Failed);
                error!(channel = %self.channel, error = %e, "Handler failed");
            }
        }
    }
}

/// 正常退出与被中止都经过这里，状态观察方总能看到 `Stopped`
impl Drop for Worker {
    fn drop(&mut self) {
        self.state.send_replace(LoopState::Stopped);
    }
}

/// 运行中消费循环的句柄
pub struct LoopHandle {
    channel: Channel,
    state: watch::Receiver<LoopState>,
    stats: Arc<LoopStats>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> LoopStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    /// 等待进入指定状态；循环任务已退出且未到达该状态时返回 false
    pub async fn wait_for(&mut self, target: LoopState) -> bool {
        self.state.wait_for(|state| *state == target).await.is_ok()
    }

    /// 限时等待任务退出，超时则中止
    pub async fn join(self, timeout: Duration) -> bool {
        let abort = self.task.abort_handle();
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(channel = %self.channel, error = %e, "Consumer loop task failed");
                false
            }
            Err(_) => {
                abort.abort();
                warn!(
                    channel = %self.channel,
                    timeout_ms = timeout.as_millis() as u64,
                    "Consumer loop did not stop in time, aborted"
                );
                false
            }
        }
    }
}
