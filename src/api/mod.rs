pub mod health;
pub mod metrics;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Router served on the metrics port / 指标端口路由
pub fn metrics_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router served on the health port / 健康检查端口路由
pub fn health_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
