use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "kind": "not_found",
            "message": "Not found. Try /drift, /drift/latest or /health/ready.",
        })),
    )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health/live", get(handlers::live))
        .route("/health/ready", get(handlers::ready))
        .route("/drift", get(handlers::run_drift))
        .route("/drift/latest", get(handlers::latest_report))
        .route("/drift/reports", get(handlers::list_reports))
        .route("/predictions", post(handlers::log_prediction))
        .fallback(handle_404)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
