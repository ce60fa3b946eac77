use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assessment::Variant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: String,
    pub value: u8,
    pub answered_at: DateTime<Utc>,
}

/// Raw responses of one attempt, kept in the order they were first given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerRecord {
    entries: Vec<AnswerEntry>,
}

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: &str) -> Option<u8> {
        self.entries
            .iter()
            .find(|entry| entry.question_id == question_id)
            .map(|entry| entry.value)
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.get(question_id).is_some()
    }

    /// Inserts or replaces the response for `question_id`.
    ///
    /// A replaced response keeps its original position. Returns `true` when
    /// an earlier response was overwritten.
    pub fn upsert(&mut self, question_id: &str, value: u8, at: DateTime<Utc>) -> bool {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.question_id == question_id)
        {
            entry.value = value;
            entry.answered_at = at;
            return true;
        }

        self.entries.push(AnswerEntry {
            question_id: question_id.to_string(),
            value,
            answered_at: at,
        });
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnswerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Completed,
    Expired,
}

impl AttemptStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, AttemptStatus::Completed | AttemptStatus::Expired)
    }

    /// Status only moves forward; a finished attempt never reopens.
    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        match (self, next) {
            (AttemptStatus::NotStarted, AttemptStatus::InProgress) => true,
            (AttemptStatus::InProgress, AttemptStatus::Completed) => true,
            (AttemptStatus::InProgress, AttemptStatus::Expired) => true,
            (current, next) => *current == next,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::NotStarted => "not_started",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptState {
    pub attempt_id: Uuid,
    pub variant: Variant,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub answers: AnswerRecord,
    pub current_index: usize,
    pub status: AttemptStatus,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl AttemptState {
    pub fn begin(variant: Variant, now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            variant,
            started_at: now,
            deadline: now + duration,
            answers: AnswerRecord::new(),
            current_index: 0,
            status: AttemptStatus::InProgress,
            finished_at: None,
        }
    }

    pub fn question_count(&self) -> usize {
        self.variant.question_count()
    }

    /// Time left against the absolute deadline, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let remaining = self.deadline - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.question_count()
    }

    /// Moves to `next`; returns `false` and leaves the attempt untouched when
    /// the move would regress a finished attempt.
    pub fn finish(&mut self, next: AttemptStatus, now: DateTime<Utc>) -> bool {
        if !next.is_finished() || !self.status.can_transition_to(next) || self.status == next {
            return false;
        }
        self.status = next;
        self.finished_at = Some(now);
        true
    }
}
