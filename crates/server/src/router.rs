//! HTTP router construction.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/transactions", get(api::transactions))
        .route("/api/transactions/{id}/categories", put(api::update_categories))
        .route("/api/reports", get(api::reports_list))
        .route("/api/visuals", get(api::visuals))
        .route("/api/visuals/redraw", post(api::visuals_redraw))
        .route("/api/insights", get(api::insights))
        .route("/api/upload", post(api::upload))
        .route("/api/data", delete(api::truncate_data))
        .route("/api/cache", get(api::cache_status).delete(api::cache_clear))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
