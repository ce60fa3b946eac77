use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::middlewares::csrf::{generate_csrf_token, set_csrf_cookie};

/// GET /api/v1/csrf-token - token in the JSON body and in the `csrf_token` cookie
pub async fn get_csrf_token() -> impl IntoResponse {
    tracing::debug!("Generating CSRF token");

    let token = generate_csrf_token();
    let response = (StatusCode::OK, Json(serde_json::json!({ "csrf_token": token }))).into_response();

    set_csrf_cookie(response, &token)
}
