use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    errors::{ApiError, AssessmentError},
    extractors::AppJson,
    models::AssessmentAction,
    services::{
        radar_chart::{RadarChart, DEFAULT_CHART_SIZE},
        AppState,
    },
};

pub const SESSION_COOKIE_NAME: &str = "assessment_session";

pub(crate) fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::from(AssessmentError::NotFound))
}

fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(7))
        .build()
}

/// POST /api/v1/assessments
pub async fn create_assessment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.assessments.create_session(Utc::now()).await?;
    let jar = jar.add(session_cookie(view.session_id));

    Ok((StatusCode::CREATED, jar, Json(view)))
}

/// GET /api/v1/assessments/current
pub async fn current_assessment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let id = jar
        .get(SESSION_COOKIE_NAME)
        .ok_or_else(|| ApiError::not_found("No assessment in progress"))
        .and_then(|cookie| parse_session_id(cookie.value()))?;

    let view = state.assessments.get_session(id, Utc::now()).await?;
    Ok(Json(view))
}

/// GET /api/v1/assessments/{id}
pub async fn get_assessment(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&session_id)?;
    let view = state.assessments.get_session(id, Utc::now()).await?;
    Ok(Json(view))
}

/// POST /api/v1/assessments/{id}/actions
pub async fn dispatch_action(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(action): AppJson<AssessmentAction>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&session_id)?;
    tracing::debug!("Dispatching {} for session {}", action.name(), id);

    let view = state.assessments.dispatch(id, action, Utc::now()).await?;
    Ok(Json(view))
}

/// DELETE /api/v1/assessments/{id}
pub async fn abandon_assessment(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&session_id)?;
    state.assessments.abandon(id).await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/v1/assessments/{id}/report
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&session_id)?;
    let report = state.assessments.report(id, Utc::now()).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub size: Option<u32>,
}

/// GET /api/v1/assessments/{id}/chart.svg
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&session_id)?;
    let report = state.assessments.report(id, Utc::now()).await?;
    let chart = RadarChart::from_report(&report, query.size.unwrap_or(DEFAULT_CHART_SIZE));

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        chart.render_svg(),
    ))
}
