use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attempt::AttemptState;

/// Display-only countdown events. Expiry itself is decided on the server
/// by comparing against the stored deadline, never by these ticks.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimerTick {
    pub session_id: Uuid,
    pub remaining_seconds: i64,
    pub elapsed_seconds: i64,
    pub total_seconds: i64,
    pub deadline: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeExpired {
    pub session_id: Uuid,
    pub deadline: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl TimerEvent {
    /// Event for `attempt` as seen at `now`.
    pub fn at(session_id: Uuid, attempt: &AttemptState, now: DateTime<Utc>) -> Self {
        if attempt.is_past_deadline(now) {
            return TimerEvent::TimeExpired(TimeExpired {
                session_id,
                deadline: attempt.deadline,
                timestamp: now,
                message: "Time limit reached".to_string(),
            });
        }

        let total = (attempt.deadline - attempt.started_at).num_seconds();
        let remaining = attempt.remaining(now).num_seconds();
        TimerEvent::TimerTick(TimerTick {
            session_id,
            remaining_seconds: remaining,
            elapsed_seconds: (total - remaining).max(0),
            total_seconds: total,
            deadline: attempt.deadline,
            timestamp: now,
        })
    }

    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            TimerEvent::TimerTick(_) => "timer-tick",
            TimerEvent::TimeExpired(_) => "time-expired",
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, TimerEvent::TimeExpired(_))
    }
}
