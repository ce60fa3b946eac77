use axum::http::StatusCode;
use brightpath_api::{
    models::{AssessmentSession, AttemptState, Screen, StudentInfo, Variant},
    services::{persistence::SessionPersistence, question_bank},
};
use chrono::{Duration, Utc};
use serde_json::json;

mod common;

async fn start_quick_attempt(app: &axum::Router) -> String {
    let (status, view) = common::send_json(app, "POST", "/api/v1/assessments", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["screen"], "landing");
    let id = view["session_id"].as_str().unwrap().to_string();
    let actions_uri = format!("/api/v1/assessments/{}/actions", id);

    let (status, view) = common::send_json(
        app,
        "POST",
        &actions_uri,
        Some(json!({ "type": "select-variant", "variant": "quick" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["screen"], "student_info");

    let (status, view) = common::send_json(
        app,
        "POST",
        &actions_uri,
        Some(json!({
            "type": "submit-student-info",
            "name": "Ada Lovelace",
            "email": "ada@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["screen"], "instructions");
    assert_eq!(view["instructions"]["question_count"], 10);
    assert_eq!(view["instructions"]["duration_seconds"], 300);

    let (status, view) =
        common::send_json(app, "POST", &actions_uri, Some(json!({ "type": "start-test" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["screen"], "test");
    assert_eq!(view["attempt"]["status"], "in_progress");

    id
}

#[tokio::test]
async fn quick_assessment_end_to_end() {
    let app = common::create_test_app();
    let router = &app.router;
    let id = start_quick_attempt(router).await;
    let actions_uri = format!("/api/v1/assessments/{}/actions", id);

    for (index, question) in question_bank::questions(Variant::Quick).iter().enumerate() {
        let (status, view) = common::send_json(
            router,
            "POST",
            &actions_uri,
            Some(json!({ "type": "answer", "question_id": question.id, "value": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "answer {} rejected: {}", index, view);
        assert_eq!(view["attempt"]["answered_count"], index + 1);
    }

    let (status, view) =
        common::send_json(router, "POST", &actions_uri, Some(json!({ "type": "finish-test" })))
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["screen"], "results");

    let result = &view["result"];
    assert_eq!(result["status"], "completed");
    let categories = result["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 5);
    for category in categories {
        assert_eq!(category["score"], 6);
        assert_eq!(category["max"], 10);
    }

    let (status, report) =
        common::send_json(router, "GET", &format!("/api/v1/assessments/{}/report", id), None)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total"], 30);

    let (status, headers, body) =
        common::get(router, &format!("/api/v1/assessments/{}/chart.svg", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "image/svg+xml");
    let svg = String::from_utf8(body).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("(6/10)"));
}

#[tokio::test]
async fn answering_other_than_current_question_is_rejected() {
    let app = common::create_test_app();
    let id = start_quick_attempt(&app.router).await;

    let second = question_bank::question_at(Variant::Quick, 1).unwrap();
    let (status, body) = common::send_json(
        &app.router,
        "POST",
        &format!("/api/v1/assessments/{}/actions", id),
        Some(json!({ "type": "answer", "question_id": second.id, "value": 4 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
}

#[tokio::test]
async fn invalid_student_info_returns_field_errors() {
    let app = common::create_test_app();
    let (_, view) = common::send_json(&app.router, "POST", "/api/v1/assessments", None).await;
    let actions_uri = format!(
        "/api/v1/assessments/{}/actions",
        view["session_id"].as_str().unwrap()
    );

    common::send_json(
        &app.router,
        "POST",
        &actions_uri,
        Some(json!({ "type": "select-variant", "variant": "standard" })),
    )
    .await;
    let (status, body) = common::send_json(
        &app.router,
        "POST",
        &actions_uri,
        Some(json!({ "type": "submit-student-info", "name": "Ada", "email": "nope" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["email"].is_array());
}

#[tokio::test]
async fn reload_after_deadline_shows_expired_results() {
    let app = common::create_test_app();

    let started = Utc::now() - Duration::minutes(10);
    let mut session = AssessmentSession::new(started);
    session.variant = Some(Variant::Quick);
    session.student = Some(StudentInfo {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        phone: None,
        organization: None,
    });
    session.screen = Screen::Test;
    session.attempt = Some(AttemptState::begin(
        Variant::Quick,
        started,
        Duration::minutes(5),
    ));
    session.revision = 4;

    let persistence = SessionPersistence::new(app.store.clone());
    persistence.save(&session).await.unwrap();

    let (status, view) = common::send_json(
        &app.router,
        "GET",
        &format!("/api/v1/assessments/{}", session.id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["screen"], "results");
    assert_eq!(view["attempt"]["status"], "expired");
    assert_eq!(view["attempt"]["remaining_seconds"], 0);
    for category in view["result"]["categories"].as_array().unwrap() {
        assert_eq!(category["score"], category["min"]);
    }

    // the reconciled state was written back
    let stored = persistence.load(session.id).await.unwrap().unwrap();
    assert_eq!(stored.screen, Screen::Results);
    assert!(stored.revision > 4);

    let (status, _) = common::send_json(
        &app.router,
        "GET",
        &format!("/api/v1/assessments/{}/stream", session.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn session_with_foreign_answers_recovers_to_landing() {
    let app = common::create_test_app();

    let now = Utc::now();
    let mut session = AssessmentSession::new(now);
    session.variant = Some(Variant::Quick);
    session.student = Some(StudentInfo {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        phone: None,
        organization: None,
    });
    session.screen = Screen::Test;
    let mut attempt = AttemptState::begin(Variant::Quick, now, Duration::minutes(5));
    // only part of the standard variant
    attempt.answers.upsert("ss-10", 3, now);
    session.attempt = Some(attempt);
    session.revision = 5;

    let persistence = SessionPersistence::new(app.store.clone());
    persistence.save(&session).await.unwrap();

    let (status, view) = common::send_json(
        &app.router,
        "GET",
        &format!("/api/v1/assessments/{}", session.id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", view);
    assert_eq!(view["screen"], "landing");
    assert_eq!(view["session_id"], session.id.to_string());
    assert_eq!(view["revision"], 6);
    assert!(view["attempt"].is_null());

    let stored = persistence.load(session.id).await.unwrap().unwrap();
    assert_eq!(stored.screen, Screen::Landing);

    // the recovered session is usable again
    let (status, view) = common::send_json(
        &app.router,
        "POST",
        &format!("/api/v1/assessments/{}/actions", session.id),
        Some(json!({ "type": "select-variant", "variant": "standard" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["screen"], "student_info");
}

#[tokio::test]
#[serial_test::serial]
async fn starting_assessments_is_rate_limited_per_ip() {
    std::env::remove_var("RATE_LIMIT_DISABLED");
    let config = brightpath_api::Config {
        assessment_rate_limit_per_minute: 2,
        ..common::test_config()
    };
    let app = common::create_test_app_with(config, Default::default());

    for _ in 0..2 {
        let (status, _) = common::send_json(&app.router, "POST", "/api/v1/assessments", None).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = common::send_json(&app.router, "POST", "/api/v1/assessments", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["status"], 429);
    assert_eq!(app.store.len().await, 2);
}

#[tokio::test]
async fn current_assessment_follows_session_cookie() {
    let app = common::create_test_app();
    let csrf = common::get_csrf_token(&app.router).await;

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/assessments")
                .header("x-csrf-token", &csrf)
                .header("cookie", format!("csrf_token={}", csrf))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, headers, body) = common::read_body(response).await;
    assert_eq!(status, StatusCode::CREATED);

    let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = view["session_id"].as_str().unwrap();
    let cookie = headers["set-cookie"].to_str().unwrap();
    assert!(cookie.starts_with(&format!("assessment_session={}", id)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/assessments/current")
                .header("cookie", format!("assessment_session={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, _, body) = common::read_body(response).await;
    assert_eq!(status, StatusCode::OK);
    let current: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(current["session_id"], id);

    let (status, _, _) = common::get(&app.router, "/api/v1/assessments/current").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn abandoned_session_is_gone_and_report_needs_results() {
    let app = common::create_test_app();
    let id = start_quick_attempt(&app.router).await;

    let (status, _) = common::send_json(
        &app.router,
        "GET",
        &format!("/api/v1/assessments/{}/report", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::send_json(
        &app.router,
        "DELETE",
        &format!("/api/v1/assessments/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = common::get(&app.router, &format!("/api/v1/assessments/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn actions_require_csrf_token() {
    let app = common::create_test_app();

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/assessments")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
