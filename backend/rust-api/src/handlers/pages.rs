use axum::{extract::Path, response::IntoResponse, Json};

use crate::{errors::ApiError, services::page_catalog};

/// GET /api/v1/pages
pub async fn list_pages() -> impl IntoResponse {
    Json(page_catalog::all())
}

/// GET /api/v1/pages/{slug}
pub async fn get_page(Path(slug): Path<String>) -> Result<impl IntoResponse, ApiError> {
    page_catalog::find(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Page '{}' not found", slug)))
}
