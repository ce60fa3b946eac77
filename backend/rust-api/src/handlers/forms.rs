use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::AppJson,
    models::forms::{CertificateValidationRequest, ContactRequest, DemoRequest},
    services::AppState,
};

/// POST /api/v1/contact
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state.forms.submit_contact(req, Utc::now()).await?;
    Ok(Json(accepted))
}

/// POST /api/v1/demo-request
pub async fn submit_demo_request(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<DemoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state.forms.submit_demo_request(req, Utc::now()).await?;
    Ok(Json(accepted))
}

/// POST /api/v1/certificates/validate
pub async fn validate_certificate(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CertificateValidationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state.forms.validate_certificate(req, Utc::now()).await?;
    Ok(Json(accepted))
}
