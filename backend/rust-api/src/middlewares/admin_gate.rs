use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

use crate::errors::ApiError;
use crate::services::AppState;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Shared-secret gate for the admin view and `/metrics`.
///
/// Accepts the secret in `x-admin-secret` or as the password of HTTP Basic
/// auth (username ignored).
pub async fn admin_gate_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = presented_secret(request.headers());

    match presented {
        Some(secret) if secrets_match(&secret, &state.config.admin_secret) => {
            next.run(request).await
        }
        Some(_) => {
            tracing::warn!("Admin gate rejected a wrong secret for {}", request.uri().path());
            unauthorized()
        }
        None => unauthorized(),
    }
}

fn presented_secret(headers: &HeaderMap) -> Option<String> {
    if let Some(secret) = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return Some(secret.to_string());
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let encoded = auth_header.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (_, password) = credentials.split_once(':')?;
    Some(password.to_string())
}

/// Compares digests so the check does not depend on where the strings differ.
fn secrets_match(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn unauthorized() -> Response {
    let mut response =
        ApiError::new(StatusCode::UNAUTHORIZED, "Admin secret required").into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"admin\""),
    );
    response
}
