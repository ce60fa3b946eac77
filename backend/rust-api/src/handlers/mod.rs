use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend = state.sessions.backend_name();

    let (status_code, status, store) = match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.sessions.ping(),
    )
    .await
    {
        Ok(Ok(())) => (
            StatusCode::OK,
            "healthy",
            json!({ "status": "healthy", "backend": backend }),
        ),
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "degraded",
            json!({ "status": "unhealthy", "backend": backend, "error": format!("{:#}", e) }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "degraded",
            json!({ "status": "unhealthy", "backend": backend, "error": "timeout after 1s" }),
        ),
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "brightpath-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": { "session_store": store }
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

pub mod admin;
pub mod assessments;
pub mod csrf;
pub mod forms;
pub mod pages;
pub mod sse;
