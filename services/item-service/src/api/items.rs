//! 商品记录接口
//!
//! 变更成功后才发布事件；发布失败不影响响应。

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use relay_bootstrap::ServiceContext;
use relay_domain_core::{ItemChanges, ItemId, NewItem};
use relay_errors::AppError;
use relay_event_core::DomainEvent;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiResult;

fn parse_id(raw: &str) -> Result<ItemId, AppError> {
    ItemId::parse(raw).map_err(|_| AppError::validation("Invalid item ID"))
}

fn item_not_found() -> AppError {
    AppError::not_found("Item not found")
}

pub(super) async fn list(State(ctx): State<ServiceContext>) -> ApiResult<Json<Value>> {
    let items = ctx.store.list().await?;
    Ok(Json(json!({
        "success": true,
        "count": items.len(),
        "data": items,
    })))
}

pub(super) async fn get(
    State(ctx): State<ServiceContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let item = ctx.store.find_by_id(&id).await?.ok_or_else(item_not_found)?;
    Ok(Json(json!({ "success": true, "data": item })))
}

pub(super) async fn create(
    State(ctx): State<ServiceContext>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = payload?;
    input.validate()?;

    let item = ctx.store.create(input).await?;
    info!(item_id = %item.id, "Item created");

    ctx.publisher.publish(DomainEvent::created(item.clone())).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": item,
            "message": "Item created successfully",
        })),
    ))
}

pub(super) async fn update(
    State(ctx): State<ServiceContext>,
    Path(id): Path<String>,
    payload: Result<Json<ItemChanges>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let Json(changes) = payload?;
    changes.validate()?;

    let item = ctx
        .store
        .update(&id, changes)
        .await?
        .ok_or_else(item_not_found)?;
    info!(item_id = %item.id, "Item updated");

    ctx.publisher.publish(DomainEvent::updated(item.clone())).await;

    Ok(Json(json!({
        "success": true,
        "data": item,
        "message": "Item updated successfully",
    })))
}

pub(super) async fn delete(
    State(ctx): State<ServiceContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    if !ctx.store.delete(&id).await? {
        return Err(item_not_found().into());
    }
    info!(item_id = %id, "Item deleted");

    ctx.publisher.publish(DomainEvent::deleted(id)).await;

    Ok(Json(json!({
        "success": true,
        "message": "Item deleted successfully",
    })))
}

pub(super) async fn search(
    State(ctx): State<ServiceContext>,
    Path(query): Path<String>,
) -> ApiResult<Json<Value>> {
    let items = ctx.store.search(&query).await?;
    Ok(Json(json!({
        "success": true,
        "query": query,
        "count": items.len(),
        "data": items,
    })))
}
