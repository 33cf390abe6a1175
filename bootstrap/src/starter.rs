//! 服务启动器
//!
//! 提供统一的服务启动模式

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_config::AppConfig;
use relay_errors::{AppError, AppResult};
use relay_messaging::RelayPublisher;
use relay_ports::ItemRepository;
use relay_telemetry::init_metrics;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::coordinator::{ConsumerStatus, RelayCoordinator, RelaySettings};
use crate::infrastructure::Infrastructure;
use crate::runtime::init_runtime;
use crate::shutdown::ShutdownController;

/// 构建 HTTP 路由所需的共享句柄
#[derive(Clone)]
pub struct ServiceContext {
    pub service_name: String,
    pub store: Arc<dyn ItemRepository>,
    pub publisher: RelayPublisher,
    pub consumers: ConsumerStatus,
    pub metrics: Option<PrometheusHandle>,
}

impl ServiceContext {
    pub fn from_coordinator(
        coordinator: &RelayCoordinator,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            service_name: coordinator.config().service_name.clone(),
            store: coordinator.store(),
            publisher: coordinator.publisher(),
            consumers: coordinator.consumers(),
            metrics,
        }
    }
}

/// 运行服务
///
/// 这是服务的统一入口点。它负责：
/// 1. 加载配置并初始化日志
/// 2. 安装 Prometheus recorder
/// 3. 依次连接记录存储、日志流、队列（失败即退出）
/// 4. 声明拓扑并启动消费循环
/// 5. 调用用户提供的闭包构建路由并启动 HTTP 服务
/// 6. 收到信号后按序关闭
///
/// # 示例
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     relay_bootstrap::run("config", item_service::router).await
/// }
/// ```
pub async fn run<F>(config_dir: &str, build_router: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(ServiceContext) -> Router,
{
    let config = AppConfig::load(config_dir)?;
    init_runtime(&config);

    info!(service_name = %config.service_name, "Starting service");

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
            None
        }
    };

    let settings = RelaySettings::from_config(&config);
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    let addr = config.listen_addr();

    let infra = Infrastructure::from_config(config).await?;
    let coordinator = RelayCoordinator::start(infra, settings).await?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            coordinator.shutdown().await;
            return Err(e.into());
        }
    };

    let router = build_router(ServiceContext::from_coordinator(&coordinator, metrics));

    let shutdown = ShutdownController::new();
    shutdown.trigger_on_signal();

    serve(listener, router, coordinator, grace, shutdown.signal()).await?;

    info!("Service stopped");
    Ok(())
}

/// 运行 HTTP 服务直到 `signal` 完成，然后按序关闭
///
/// 在途请求最多等待 `grace`，之后停止消费循环并关闭基础设施。
pub async fn serve<S>(
    listener: TcpListener,
    router: Router,
    coordinator: RelayCoordinator,
    grace: Duration,
    signal: S,
) -> AppResult<()>
where
    S: Future<Output = ()> + Send,
{
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "HTTP server listening"),
        Err(e) => warn!(error = %e, "HTTP server listening on unknown address"),
    }

    let stop = CancellationToken::new();
    let server =
        axum::serve(listener, router).with_graceful_shutdown(stop.clone().cancelled_owned());
    let mut server_task = tokio::spawn(async move { server.await });

    let exited = tokio::select! {
        result = &mut server_task => Some(result),
        _ = signal => None,
    };

    let outcome = match exited {
        Some(result) => server_result(result),
        None => {
            info!("Stopping HTTP server");
            stop.cancel();
            match tokio::time::timeout(grace, &mut server_task).await {
                Ok(result) => server_result(result),
                Err(_) => {
                    warn!(
                        grace_secs = grace.as_secs(),
                        "Grace period elapsed, dropping in-flight requests"
                    );
                    server_task.abort();
                    Ok(())
                }
            }
        }
    };

    coordinator.shutdown().await;
    outcome
}

fn server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> AppResult<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(AppError::internal(format!("HTTP server error: {}", e))),
        Err(e) => Err(AppError::internal(format!("HTTP server task failed: {}", e))),
    }
}
