use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use crate::{
    errors::ApiError,
    handlers::assessments::parse_session_id,
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{timer::TimerEvent, AttemptState, AttemptStatus},
    services::AppState,
};

/// SSE endpoint for countdown display
/// GET /api/v1/assessments/{id}/stream
pub async fn assessment_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&session_id)?;
    let attempt = state.assessments.running_attempt(id, Utc::now()).await?;

    let tick_interval = state.config.tick_interval_ms;
    tracing::info!(
        "Starting SSE stream: session={}, deadline={}, tick_interval={}ms",
        id,
        attempt.deadline,
        tick_interval
    );

    let refresh = move || {
        let state = state.clone();
        async move {
            match state.assessments.current_attempt(id, Utc::now()).await {
                Ok(attempt) => attempt,
                Err(e) => {
                    tracing::debug!("Ending SSE stream for session {}: {}", id, e);
                    None
                }
            }
        }
    };

    let stream = create_timer_stream(id, attempt, tick_interval, refresh);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Decrements the active stream gauge when the stream is dropped.
struct ConnectionGuard;

impl ConnectionGuard {
    fn open() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        ConnectionGuard
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// Each tick after the first re-reads the attempt through `refresh` and
/// recomputes time from its stored deadline, so a slow or paused consumer
/// never sees drifted time. The stream ends after one `time-expired`, or
/// silently once the attempt is completed or gone.
fn create_timer_stream<F, Fut>(
    session_id: Uuid,
    attempt: AttemptState,
    tick_interval_ms: u64,
    refresh: F,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Option<AttemptState>>,
{
    let guard = ConnectionGuard::open();

    stream::unfold(
        (Some(attempt), false, refresh, guard),
        move |(snapshot, finished, refresh, guard)| async move {
            if finished {
                return None;
            }
            let attempt = match snapshot {
                Some(attempt) => attempt,
                None => {
                    sleep(Duration::from_millis(tick_interval_ms)).await;
                    refresh().await?
                }
            };
            if attempt.status == AttemptStatus::Completed {
                tracing::debug!("Attempt completed, closing stream: session={}", session_id);
                return None;
            }

            let timer_event = TimerEvent::at(session_id, &attempt, Utc::now());
            let expired = timer_event.is_expired();
            if expired {
                tracing::info!("Timer expired: session={}", session_id);
            }

            let event = Event::default()
                .event(timer_event.event_name())
                .data(timer_event.to_sse_data());

            Some((Ok(event), (None, expired, refresh, guard)))
        },
    )
}
