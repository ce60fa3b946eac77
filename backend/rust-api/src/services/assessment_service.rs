use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::AssessmentSettings;
use crate::errors::AssessmentError;
use crate::metrics::{ANSWERS_RECORDED_TOTAL, ASSESSMENTS_TOTAL, ATTEMPTS_ACTIVE};
use crate::models::{
    AssessmentAction, AssessmentSession, AssessmentView, AttemptState, AttemptStatus,
    AttemptView, InstructionsView, QuestionView, Screen, ScoreReport, RESPONSE_MAX, RESPONSE_MIN,
};
use crate::services::persistence::{Loaded, SessionPersistence};
use crate::services::session_store::SaveOutcome;
use crate::services::{question_bank, scoring, state_machine};

/// Runs the assessment flow against persisted sessions.
///
/// Every read reconciles the session against the wall clock first, so a
/// session left on the test screen past its deadline is finalized as
/// expired before anything else happens to it.
pub struct AssessmentService {
    persistence: SessionPersistence,
    settings: AssessmentSettings,
}

impl AssessmentService {
    pub fn new(persistence: SessionPersistence, settings: AssessmentSettings) -> Self {
        Self {
            persistence,
            settings,
        }
    }

    pub async fn create_session(&self, now: DateTime<Utc>) -> Result<AssessmentView, AssessmentError> {
        let session = AssessmentSession::new(now);
        self.persist(&session).await?;

        ASSESSMENTS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!("Assessment session created: {}", session.id);

        self.view(&session, now)
    }

    pub async fn get_session(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AssessmentView, AssessmentError> {
        let session = self.load_reconciled(id, now).await?;

        match self.view(&session, now) {
            Err(AssessmentError::Integrity(reason)) => {
                tracing::warn!("Session {} failed scoring: {}", id, reason);
                let fresh = self.recover(id, session.revision, now).await?;
                self.view(&fresh, now)
            }
            other => other,
        }
    }

    pub async fn dispatch(
        &self,
        id: Uuid,
        action: AssessmentAction,
        now: DateTime<Utc>,
    ) -> Result<AssessmentView, AssessmentError> {
        let session = self.load_reconciled(id, now).await?;
        let action_name = action.name();

        let next = state_machine::transition(&session, action, now, &self.settings)?;
        self.persist(&next).await?;

        tracing::debug!(
            "Session {} handled {}: {} -> {} (revision {})",
            id,
            action_name,
            session.screen.as_str(),
            next.screen.as_str(),
            next.revision
        );
        record_transition(action_name, &next);

        self.view(&next, now)
    }

    /// Drops the persisted session; the only way out of an attempt besides retake.
    pub async fn abandon(&self, id: Uuid) -> Result<(), AssessmentError> {
        if let Some(session) = self.persistence.load(id).await? {
            if session.attempt_status() == AttemptStatus::InProgress {
                ATTEMPTS_ACTIVE.dec();
            }
        }
        self.persistence.clear(id).await?;
        ASSESSMENTS_TOTAL.with_label_values(&["abandoned"]).inc();
        tracing::info!("Assessment session abandoned: {}", id);
        Ok(())
    }

    pub async fn report(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ScoreReport, AssessmentError> {
        let session = self.load_reconciled(id, now).await?;
        if session.screen != Screen::Results {
            return Err(AssessmentError::InvalidTransition {
                screen: session.screen.as_str(),
                action: "report",
            });
        }
        let attempt = session
            .attempt
            .as_ref()
            .ok_or_else(|| AssessmentError::Integrity("results without attempt".to_string()))?;
        scoring::report(attempt, &question_bank::questions(attempt.variant))
    }

    /// Attempt currently on the test screen, for the countdown stream.
    pub async fn running_attempt(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AttemptState, AssessmentError> {
        let session = self.load_reconciled(id, now).await?;
        match (session.screen, session.attempt) {
            (Screen::Test, Some(attempt)) => Ok(attempt),
            (screen, _) => Err(AssessmentError::InvalidTransition {
                screen: screen.as_str(),
                action: "stream",
            }),
        }
    }

    /// Reconciled attempt on any screen; `None` once the session no longer has one.
    pub async fn current_attempt(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptState>, AssessmentError> {
        Ok(self.load_reconciled(id, now).await?.attempt)
    }

    async fn load_reconciled(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AssessmentSession, AssessmentError> {
        let mut session = match self.persistence.fetch(id).await? {
            Loaded::Valid(session) => session,
            Loaded::Missing => return Err(AssessmentError::NotFound),
            Loaded::Discarded { revision } => return self.recover(id, revision, now).await,
        };

        if state_machine::reconcile(&mut session, now) {
            session.revision += 1;
            match self.persistence.save(&session).await? {
                SaveOutcome::Stored => {
                    if session.attempt_status() == AttemptStatus::Expired {
                        ASSESSMENTS_TOTAL.with_label_values(&["expired"]).inc();
                        ATTEMPTS_ACTIVE.dec();
                    }
                }
                SaveOutcome::Stale => {
                    // another request got there first; take its version
                    return match self.persistence.fetch(id).await? {
                        Loaded::Valid(session) => Ok(session),
                        Loaded::Missing => Err(AssessmentError::NotFound),
                        Loaded::Discarded { revision } => self.recover(id, revision, now).await,
                    };
                }
            }
        }

        Ok(session)
    }

    /// Replaces an untrustworthy record with a fresh landing session under
    /// the same id, one revision above what was stored.
    async fn recover(
        &self,
        id: Uuid,
        stored_revision: u64,
        now: DateTime<Utc>,
    ) -> Result<AssessmentSession, AssessmentError> {
        let mut session = AssessmentSession::new(now);
        session.id = id;
        session.revision = stored_revision + 1;
        self.persist(&session).await?;

        ASSESSMENTS_TOTAL.with_label_values(&["reset"]).inc();
        tracing::warn!(
            "Session {} reset to landing at revision {}",
            id,
            session.revision
        );
        Ok(session)
    }

    async fn persist(&self, session: &AssessmentSession) -> Result<(), AssessmentError> {
        match self.persistence.save(session).await? {
            SaveOutcome::Stored => Ok(()),
            SaveOutcome::Stale => Err(AssessmentError::StaleRevision),
        }
    }

    fn view(
        &self,
        session: &AssessmentSession,
        now: DateTime<Utc>,
    ) -> Result<AssessmentView, AssessmentError> {
        let instructions = match (session.screen, session.variant) {
            (Screen::Instructions, Some(variant)) => Some(InstructionsView {
                variant,
                question_count: variant.question_count(),
                duration_seconds: self.settings.duration_for(variant).num_seconds(),
                scale_min: RESPONSE_MIN,
                scale_max: RESPONSE_MAX,
            }),
            _ => None,
        };

        let attempt = session.attempt.as_ref().map(|attempt| {
            let current_question = if attempt.status == AttemptStatus::InProgress {
                question_bank::question_at(attempt.variant, attempt.current_index)
                    .map(|question| QuestionView::new(question, attempt.current_index))
            } else {
                None
            };
            let current_answer = current_question
                .as_ref()
                .and_then(|question| attempt.answers.get(&question.id));

            AttemptView {
                attempt_id: attempt.attempt_id,
                status: attempt.status,
                started_at: attempt.started_at,
                deadline: attempt.deadline,
                remaining_seconds: attempt.remaining(now).num_seconds(),
                current_index: attempt.current_index,
                question_count: attempt.question_count(),
                answered_count: attempt.answers.len(),
                current_question,
                current_answer,
            }
        });

        let result = match (&session.screen, &session.attempt) {
            (Screen::Results, Some(attempt)) => Some(scoring::report(
                attempt,
                &question_bank::questions(attempt.variant),
            )?),
            (Screen::Results, None) => {
                return Err(AssessmentError::Integrity(
                    "results screen without attempt".to_string(),
                ))
            }
            _ => None,
        };

        Ok(AssessmentView {
            session_id: session.id,
            screen: session.screen,
            variant: session.variant,
            revision: session.revision,
            student_name: session.student.as_ref().map(|s| s.name.clone()),
            instructions,
            attempt,
            result,
        })
    }
}

fn record_transition(action: &str, next: &AssessmentSession) {
    match action {
        "start-test" => {
            ASSESSMENTS_TOTAL.with_label_values(&["started"]).inc();
            ATTEMPTS_ACTIVE.inc();
        }
        "answer" => {
            if let Some(variant) = next.variant {
                ANSWERS_RECORDED_TOTAL
                    .with_label_values(&[variant.as_str()])
                    .inc();
            }
        }
        "finish-test" => {
            ASSESSMENTS_TOTAL.with_label_values(&["completed"]).inc();
            ATTEMPTS_ACTIVE.dec();
        }
        "retake" => {
            ASSESSMENTS_TOTAL.with_label_values(&["retaken"]).inc();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StudentInfoForm, Variant};
    use crate::services::session_store::MemorySessionStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn service() -> AssessmentService {
        AssessmentService::new(
            SessionPersistence::new(Arc::new(MemorySessionStore::new())),
            AssessmentSettings::default(),
        )
    }

    async fn start_quick(service: &AssessmentService, now: DateTime<Utc>) -> Uuid {
        let id = service.create_session(now).await.unwrap().session_id;
        let actions = [
            AssessmentAction::SelectVariant {
                variant: "quick".to_string(),
            },
            AssessmentAction::SubmitStudentInfo(StudentInfoForm {
                name: "Alan Turing".to_string(),
                email: "alan@example.com".to_string(),
                ..Default::default()
            }),
            AssessmentAction::StartTest,
        ];
        for action in actions {
            service.dispatch(id, action, now).await.unwrap();
        }
        id
    }

    #[tokio::test]
    async fn quick_run_with_middle_answers_scores_six_per_category() {
        let service = service();
        let now = Utc::now();
        let id = start_quick(&service, now).await;

        for question in question_bank::questions(Variant::Quick) {
            service
                .dispatch(
                    id,
                    AssessmentAction::Answer {
                        question_id: question.id.to_string(),
                        value: 3,
                    },
                    now,
                )
                .await
                .unwrap();
        }
        let view = service
            .dispatch(id, AssessmentAction::FinishTest, now)
            .await
            .unwrap();

        assert_eq!(view.screen, Screen::Results);
        let report = view.result.unwrap();
        assert_eq!(report.status, AttemptStatus::Completed);
        assert_eq!(report.categories.len(), 5);
        assert!(report.categories.iter().all(|c| c.score == 6 && c.max == 10));
        assert_eq!(report.total, 30);
    }

    #[tokio::test]
    async fn reload_after_deadline_yields_expired_results() {
        let service = service();
        let start = Utc::now();
        let id = start_quick(&service, start).await;

        let later = start + Duration::seconds(301);
        let view = service.get_session(id, later).await.unwrap();

        assert_eq!(view.screen, Screen::Results);
        let attempt = view.attempt.unwrap();
        assert_eq!(attempt.status, AttemptStatus::Expired);
        assert_eq!(attempt.remaining_seconds, 0);
        assert!(attempt.current_question.is_none());
        let report = view.result.unwrap();
        assert!(report.categories.iter().all(|c| c.score == c.min));

        // never back on the test screen
        let again = service.get_session(id, later + Duration::seconds(1)).await.unwrap();
        assert_eq!(again.screen, Screen::Results);
        assert!(service.running_attempt(id, later).await.is_err());
    }

    #[tokio::test]
    async fn view_exposes_current_question_and_countdown() {
        let service = service();
        let start = Utc::now();
        let id = start_quick(&service, start).await;

        let view = service
            .get_session(id, start + Duration::seconds(60))
            .await
            .unwrap();
        let attempt = view.attempt.unwrap();
        assert_eq!(attempt.remaining_seconds, 240);
        assert_eq!(attempt.current_question.unwrap().id, "sa-01");
        assert_eq!(attempt.current_answer, None);
    }

    #[tokio::test]
    async fn report_requires_results_screen() {
        let service = service();
        let now = Utc::now();
        let id = start_quick(&service, now).await;
        assert!(matches!(
            service.report(id, now).await,
            Err(AssessmentError::InvalidTransition { screen: "test", .. })
        ));
    }

    #[tokio::test]
    async fn abandoned_session_is_gone() {
        let service = service();
        let now = Utc::now();
        let id = start_quick(&service, now).await;
        service.abandon(id).await.unwrap();
        assert!(matches!(
            service.get_session(id, now).await,
            Err(AssessmentError::NotFound)
        ));
    }

    #[tokio::test]
    async fn inconsistent_record_is_replaced_by_landing_session() {
        let store = Arc::new(MemorySessionStore::new());
        let service = AssessmentService::new(
            SessionPersistence::new(store.clone()),
            AssessmentSettings::default(),
        );
        let now = Utc::now();
        let id = start_quick(&service, now).await;
        store
            .insert_raw(&SessionPersistence::key(id), 7, "{\"screen\":\"test\"}")
            .await;

        let view = service.get_session(id, now).await.unwrap();
        assert_eq!(view.session_id, id);
        assert_eq!(view.screen, Screen::Landing);
        assert_eq!(view.revision, 8);
        assert!(view.attempt.is_none());

        // the replacement is what is stored now
        let stored = service.persistence.load(id).await.unwrap().unwrap();
        assert_eq!(stored.revision, 8);
        assert_eq!(stored.screen, Screen::Landing);
    }
}
