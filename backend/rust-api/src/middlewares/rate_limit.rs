use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

use crate::errors::ApiError;
use crate::services::AppState;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window request counter keyed by client.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    counters: Mutex<HashMap<String, (Instant, u32)>>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, RATE_WINDOW)
    }

    /// Counts one request for `key`; false once the window's budget is spent.
    pub async fn check(&self, key: &str, now: Instant) -> bool {
        let mut counters = self.counters.lock().await;

        // drop expired windows so the map stays bounded by active clients
        counters.retain(|_, (started, _)| now.duration_since(*started) < self.window);

        let entry = counters.entry(key.to_string()).or_insert((now, 0));
        if entry.1 >= self.limit {
            return false;
        }
        entry.1 += 1;
        true
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// `for=` node of the first hop in an RFC 7239 `Forwarded` header.
fn forwarded_for(value: &str) -> Option<String> {
    let first_hop = value.split(',').next()?;
    first_hop
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("for"))
        .map(|(_, node)| node.trim().trim_matches('"').to_string())
}

/// Client address used as the rate-limit key.
///
/// Proxy headers win over the socket address: X-Forwarded-For (first entry),
/// then Forwarded, then X-Real-IP, then the peer of the TCP connection.
pub(crate) fn extract_client_ip_from(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(|ip| ip.trim().to_string())
        .or_else(|| header_str(headers, "forwarded").and_then(forwarded_for))
        .or_else(|| header_str(headers, "x-real-ip").map(str::to_string))
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(
    limiter: &FixedWindowLimiter,
    scope: &str,
    message: &'static str,
    request: Request,
    next: Next,
) -> Response {
    if std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1" {
        tracing::debug!("{} rate limit skipped (RATE_LIMIT_DISABLED=1)", scope);
        return next.run(request).await;
    }

    let client_ip = extract_client_ip_from(request.headers(), request.extensions());

    if !limiter.check(&client_ip, Instant::now()).await {
        tracing::warn!("{} rate limit exceeded for IP: {}", scope, client_ip);
        return ApiError::new(StatusCode::TOO_MANY_REQUESTS, message).into_response();
    }

    next.run(request).await
}

/// Per-IP limit on the public form endpoints.
pub async fn form_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(
        &state.form_limiter,
        "Form",
        "Too many submissions. Please wait a minute and try again.",
        request,
        next,
    )
    .await
}

/// Per-IP limit on starting new assessment sessions.
pub async fn assessment_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(
        &state.assessment_limiter,
        "Assessment",
        "Too many new assessments. Please wait a minute and try again.",
        request,
        next,
    )
    .await
}
