use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::services::AppState;

/// GET /admin/leads - recent form submissions, newest first
pub async fn list_leads(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.leads.summary().await)
}
