//! 健康检查、统计与指标

use axum::Json;
use axum::extract::State;
use relay_bootstrap::ServiceContext;
use relay_common::Timestamp;
use relay_errors::AppError;
use serde_json::{Value, json};

use crate::error::ApiResult;

pub(super) async fn health(State(ctx): State<ServiceContext>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "service": ctx.service_name,
        "timestamp": Timestamp::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "consumers": ctx.consumers.states(),
    }))
}

pub(super) async fn stats(State(ctx): State<ServiceContext>) -> ApiResult<Json<Value>> {
    let total_items = ctx.store.count().await?;
    let category_stats = ctx.store.category_stats().await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "total_items": total_items,
            "category_stats": category_stats,
            "service": ctx.service_name,
            "last_updated": Timestamp::now(),
        },
    })))
}

/// Prometheus 文本格式
pub(super) async fn metrics(State(ctx): State<ServiceContext>) -> ApiResult<String> {
    let handle = ctx
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::not_found("Metrics recorder not installed"))?;
    Ok(handle.render())
}
