#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use brightpath_api::{
    config::Config,
    create_router,
    services::{
        mail_relay::{MailRelay, OutgoingMail},
        session_store::{MemorySessionStore, SessionStore},
        AppState,
    },
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const TEST_ADMIN_SECRET: &str = "test-admin-secret";

/// Mail relay that keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailRelay {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub fail: bool,
}

impl RecordingMailRelay {
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailRelay for RecordingMailRelay {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("relay unavailable");
        }
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub mailer: Arc<RecordingMailRelay>,
    pub store: Arc<MemorySessionStore>,
}

pub fn test_config() -> Config {
    Config {
        admin_secret: TEST_ADMIN_SECRET.to_string(),
        form_rate_limit_per_minute: 1000,
        assessment_rate_limit_per_minute: 1000,
        tick_interval_ms: 10,
        ..Config::default()
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(test_config(), RecordingMailRelay::default())
}

pub fn create_test_app_with(config: Config, mailer: RecordingMailRelay) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemorySessionStore::new());
    let mailer = Arc::new(mailer);
    let session_store: Arc<dyn SessionStore> = store.clone();
    let relay: Arc<dyn MailRelay> = mailer.clone();

    let state = Arc::new(AppState::with_components(config, session_store, relay));

    TestApp {
        router: create_router(state),
        mailer,
        store,
    }
}

pub async fn read_body(response: axum::response::Response) -> (StatusCode, HeaderMap, Vec<u8>) {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();
    (status, headers, bytes)
}

pub async fn get_csrf_token(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/csrf-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, headers, body) = read_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("csrf_token=")));

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["csrf_token"].as_str().unwrap().to_string()
}

/// Sends a request carrying a valid CSRF pair, returns status and JSON body.
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let csrf = get_csrf_token(app).await;

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-csrf-token", &csrf)
        .header("cookie", format!("csrf_token={}", csrf))
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let (status, _, bytes) = read_body(response).await;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!(
                "non-JSON body for {} {}: {}",
                method,
                uri,
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_body(response).await
}
