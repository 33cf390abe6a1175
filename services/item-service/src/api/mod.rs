//! HTTP 路由

mod events;
mod items;
mod system;

use axum::Router;
use axum::routing::{get, post};
use relay_bootstrap::ServiceContext;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// 构建全部路由
pub fn router(ctx: ServiceContext) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .route("/api/stats", get(system::stats))
        .route("/api/items", get(items::list).post(items::create))
        .route(
            "/api/items/{id}",
            get(items::get).put(items::update).delete(items::delete),
        )
        .route("/api/items/search/{query}", get(items::search))
        .route("/api/notify", post(events::notify))
        .route("/api/events", post(events::custom))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
