//! Graceful Shutdown

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::runtime::shutdown_signal;

/// Shutdown 控制器
#[derive(Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发关闭
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Triggering shutdown");
        }
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 关闭触发后完成的 future
    pub fn signal(&self) -> impl Future<Output = ()> + Send + 'static {
        self.token.clone().cancelled_owned()
    }

    /// 收到进程信号时触发关闭
    pub fn trigger_on_signal(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => controller.shutdown(),
                _ = controller.token.cancelled() => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_completes_after_shutdown() {
        let controller = ShutdownController::new();
        let signal = controller.signal();
        assert!(!controller.is_shutdown());

        controller.shutdown();
        controller.shutdown();

        tokio::time::timeout(Duration::from_secs(1), signal)
            .await
            .unwrap();
        assert!(controller.is_shutdown());
    }
}
