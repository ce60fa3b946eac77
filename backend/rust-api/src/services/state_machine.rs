//! Reducer for the assessment flow.
//!
//! ```text
//! landing -> student_info -> instructions -> test -> results
//!    ^                                                  |
//!    +--------------------- retake ---------------------+
//! ```
//!
//! `transition` never mutates its input; it returns the next session with
//! the revision bumped. Expiry is decided by `reconcile`, which compares the
//! stored deadline against the wall clock.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use validator::Validate;

use crate::config::AssessmentSettings;
use crate::errors::{field_errors, AssessmentError};
use crate::models::{
    AssessmentAction, AssessmentSession, AttemptState, AttemptStatus, Screen, StudentInfoForm,
    Variant, RESPONSE_MAX, RESPONSE_MIN,
};
use crate::services::question_bank;

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 ()-]{7,20}$").unwrap();
}

/// Finalizes an in-progress attempt whose deadline has passed.
///
/// Returns `true` when the session changed and must be saved.
pub fn reconcile(session: &mut AssessmentSession, now: DateTime<Utc>) -> bool {
    if session.screen != Screen::Test {
        return false;
    }
    let Some(attempt) = session.attempt.as_mut() else {
        return false;
    };

    if attempt.status == AttemptStatus::InProgress && attempt.is_past_deadline(now) {
        let deadline = attempt.deadline;
        attempt.finish(AttemptStatus::Expired, deadline);
        session.screen = Screen::Results;
        session.updated_at = now;
        tracing::info!(
            "Attempt {} expired at deadline {} (session {})",
            attempt.attempt_id,
            deadline,
            session.id
        );
        return true;
    }

    if attempt.status.is_finished() {
        session.screen = Screen::Results;
        session.updated_at = now;
        return true;
    }

    false
}

/// Applies `action` to `session` and returns the next state.
pub fn transition(
    session: &AssessmentSession,
    action: AssessmentAction,
    now: DateTime<Utc>,
    settings: &AssessmentSettings,
) -> Result<AssessmentSession, AssessmentError> {
    let mut next = session.clone();
    reconcile(&mut next, now);

    let screen = next.screen;
    let action_name = action.name();
    match (screen, action) {
        (Screen::Landing, AssessmentAction::SelectVariant { variant }) => {
            let variant: Variant = variant.parse()?;
            next.variant = Some(variant);
            next.screen = Screen::StudentInfo;
        }
        (Screen::StudentInfo, AssessmentAction::SubmitStudentInfo(form)) => {
            let form = validate_student_info(form)?;
            next.student = Some(form.into());
            next.screen = Screen::Instructions;
        }
        (Screen::Instructions, AssessmentAction::StartTest) => {
            let variant = next.variant.ok_or_else(|| {
                AssessmentError::Integrity("instructions screen without a variant".to_string())
            })?;
            next.attempt = Some(AttemptState::begin(
                variant,
                now,
                settings.duration_for(variant),
            ));
            next.screen = Screen::Test;
        }
        (Screen::Test, AssessmentAction::Answer { question_id, value }) => {
            let attempt = active_attempt(&mut next, action_name)?;
            record_answer(attempt, &question_id, value, now)?;
        }
        (Screen::Test, AssessmentAction::PreviousQuestion) => {
            let attempt = active_attempt(&mut next, action_name)?;
            attempt.current_index = attempt.current_index.saturating_sub(1);
        }
        (Screen::Test, AssessmentAction::FinishTest) => {
            let attempt = active_attempt(&mut next, action_name)?;
            let unanswered = question_bank::questions(attempt.variant)
                .iter()
                .filter(|q| !attempt.answers.contains(q.id))
                .count();
            if unanswered > 0 {
                return Err(AssessmentError::validation(
                    "answers",
                    format!("{} question(s) still need an answer", unanswered),
                ));
            }
            attempt.finish(AttemptStatus::Completed, now);
            next.screen = Screen::Results;
        }
        (Screen::Results, AssessmentAction::Retake) => {
            next.reset_to_landing();
        }
        (screen, action) => {
            return Err(AssessmentError::InvalidTransition {
                screen: screen.as_str(),
                action: action.name(),
            });
        }
    }

    next.revision = session.revision + 1;
    next.updated_at = now;
    Ok(next)
}

fn active_attempt<'a>(
    session: &'a mut AssessmentSession,
    action: &'static str,
) -> Result<&'a mut AttemptState, AssessmentError> {
    let screen = session.screen;
    match session.attempt.as_mut() {
        Some(attempt) if attempt.status == AttemptStatus::InProgress => Ok(attempt),
        Some(_) => Err(AssessmentError::InvalidTransition {
            screen: screen.as_str(),
            action,
        }),
        None => Err(AssessmentError::Integrity(
            "test screen without an attempt".to_string(),
        )),
    }
}

fn record_answer(
    attempt: &mut AttemptState,
    question_id: &str,
    value: u8,
    now: DateTime<Utc>,
) -> Result<(), AssessmentError> {
    if !(RESPONSE_MIN..=RESPONSE_MAX).contains(&value) {
        return Err(AssessmentError::validation(
            "value",
            format!(
                "Answer must be between {} and {}",
                RESPONSE_MIN, RESPONSE_MAX
            ),
        ));
    }

    let current = question_bank::question_at(attempt.variant, attempt.current_index)
        .ok_or_else(|| {
            AssessmentError::Integrity(format!(
                "position {} outside {} variant",
                attempt.current_index, attempt.variant
            ))
        })?;
    if current.id != question_id {
        return Err(AssessmentError::validation(
            "question_id",
            format!("Answer the current question ({}) first", current.id),
        ));
    }

    let revised = attempt.answers.upsert(question_id, value, now);
    if revised {
        tracing::debug!("Answer to {} revised in attempt {}", question_id, attempt.attempt_id);
    }
    if !attempt.is_last_question() {
        attempt.current_index += 1;
    }
    Ok(())
}

fn validate_student_info(form: StudentInfoForm) -> Result<StudentInfoForm, AssessmentError> {
    let form = form.normalized();

    let mut fields = match form.validate() {
        Ok(()) => Default::default(),
        Err(errors) => field_errors(&errors),
    };
    if form.name.is_empty() {
        fields.insert("name".to_string(), vec!["Name is required".to_string()]);
    }
    if form.email.is_empty() {
        fields.insert("email".to_string(), vec!["Email is required".to_string()]);
    }
    if let Some(phone) = &form.phone {
        if !PHONE_REGEX.is_match(phone) {
            fields
                .entry("phone".to_string())
                .or_default()
                .push("Phone number looks invalid".to_string());
        }
    }

    if fields.is_empty() {
        Ok(form)
    } else {
        Err(AssessmentError::Validation {
            message: "Please correct the highlighted fields".to_string(),
            fields,
        })
    }
}

/// Structural check of a session read back from storage.
pub fn validate_shape(session: &AssessmentSession) -> Result<(), String> {
    if session.revision == 0 {
        return Err("revision must start at 1".to_string());
    }

    match session.screen {
        Screen::Landing => {}
        Screen::StudentInfo => {
            session.variant.ok_or("student_info without variant")?;
        }
        Screen::Instructions => {
            session.variant.ok_or("instructions without variant")?;
            session.student.as_ref().ok_or("instructions without student")?;
        }
        Screen::Test | Screen::Results => {
            let attempt = session.attempt.as_ref().ok_or("no attempt on test/results")?;
            if session.variant != Some(attempt.variant) {
                return Err("attempt variant differs from session variant".to_string());
            }
            if session.screen == Screen::Results && !attempt.status.is_finished() {
                return Err("results screen with unfinished attempt".to_string());
            }
        }
    }

    if let Some(attempt) = &session.attempt {
        if attempt.current_index >= attempt.question_count() {
            return Err(format!(
                "current_index {} out of range",
                attempt.current_index
            ));
        }
        if attempt.deadline <= attempt.started_at {
            return Err("deadline precedes start".to_string());
        }
        let known = question_bank::questions(attempt.variant);
        for entry in attempt.answers.iter() {
            if !known.iter().any(|q| q.id == entry.question_id) {
                return Err(format!("unknown question '{}'", entry.question_id));
            }
            if !(RESPONSE_MIN..=RESPONSE_MAX).contains(&entry.value) {
                return Err(format!("off-scale answer to '{}'", entry.question_id));
            }
        }
    }

    Ok(())
}
