//! 通知与自定义事件接口

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use relay_bootstrap::ServiceContext;
use relay_errors::AppError;
use relay_event_core::NotificationRequest;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub(super) struct NotifyBody {
    message: String,
    recipient: String,
}

/// 通知没有记录存储兜底，队列不可用时直接返回错误
pub(super) async fn notify(
    State(ctx): State<ServiceContext>,
    payload: Result<Json<NotifyBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let request = NotificationRequest::new(body.message, body.recipient);
    let recipient = request.recipient.clone();

    ctx.publisher.notify(request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Notification sent successfully",
        "recipient": recipient,
    })))
}

pub(super) async fn custom(
    State(ctx): State<ServiceContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(data) = payload?;
    if !data.is_object() {
        return Err(AppError::validation("Invalid request body").into());
    }

    let delivered = ctx.publisher.publish_custom(data).await;

    Ok(Json(json!({
        "success": true,
        "message": "Event sent successfully",
        "delivered": delivered,
    })))
}
