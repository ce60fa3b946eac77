use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

use crate::errors::ApiError;

pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// CSRF middleware using double-submit cookie pattern
///
/// For state-changing requests (POST, PUT, DELETE, PATCH) the `x-csrf-token`
/// header must equal the `csrf_token` cookie. Safe methods pass through.
pub async fn csrf_middleware(request: Request, next: Next) -> Response {
    let method = request.method();

    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        return next.run(request).await;
    }

    let cookie_token = cookie_value(&request, CSRF_COOKIE_NAME);

    let header_token = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let failure = match (cookie_token, header_token) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && cookie == header => {
            tracing::debug!("CSRF validation passed");
            return next.run(request).await;
        }
        (None, _) => "missing cookie token",
        (_, None) => "missing header token",
        _ => "token mismatch",
    };

    tracing::warn!("CSRF validation failed: {}", failure);
    ApiError::new(StatusCode::FORBIDDEN, "CSRF token missing or invalid").into_response()
}

/// Reads one cookie from the request's `Cookie` header.
pub fn cookie_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// Generate a new CSRF token
pub fn generate_csrf_token() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Attaches the CSRF cookie to `response`.
pub fn set_csrf_cookie(mut response: Response, token: &str) -> Response {
    let cookie_value = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Secure",
        CSRF_COOKIE_NAME, token
    );

    match HeaderValue::from_str(&cookie_value) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Failed to encode CSRF cookie: {}", e),
    }

    response
}
