use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::models::AssessmentSession;
use crate::services::session_store::{SaveOutcome, SessionStore};
use crate::services::state_machine;

/// Outcome of reading a session record.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Missing,
    Valid(AssessmentSession),
    /// A record exists but cannot be trusted; `revision` is the stored one,
    /// so a replacement must be saved above it.
    Discarded { revision: u64 },
}

impl Loaded {
    pub fn into_session(self) -> Option<AssessmentSession> {
        match self {
            Loaded::Valid(session) => Some(session),
            Loaded::Missing | Loaded::Discarded { .. } => None,
        }
    }
}

/// Mirrors assessment sessions into a [`SessionStore`].
///
/// Reading never fails on bad data: an unparsable or structurally
/// inconsistent record is reported as [`Loaded::Discarded`] so the caller
/// can replace it. Only backend failures surface as errors.
#[derive(Clone)]
pub struct SessionPersistence {
    store: Arc<dyn SessionStore>,
}

impl SessionPersistence {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn key(id: Uuid) -> String {
        format!("assessment:session:{}", id)
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    pub async fn save(&self, session: &AssessmentSession) -> Result<SaveOutcome> {
        let payload = serde_json::to_string(session).context("Failed to serialize session")?;
        let outcome = self
            .store
            .put_if_newer(&Self::key(session.id), session.revision, payload)
            .await?;

        if outcome == SaveOutcome::Stale {
            tracing::warn!(
                "Refused stale save of session {} at revision {}",
                session.id,
                session.revision
            );
        }
        Ok(outcome)
    }

    pub async fn fetch(&self, id: Uuid) -> Result<Loaded> {
        let Some(record) = self.store.get(&Self::key(id)).await? else {
            return Ok(Loaded::Missing);
        };
        let discarded = Loaded::Discarded {
            revision: record.revision,
        };

        let session: AssessmentSession = match serde_json::from_str(&record.payload) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Discarding unreadable session {}: {}", id, e);
                return Ok(discarded);
            }
        };

        if session.id != id {
            tracing::warn!("Discarding session {} stored under key of {}", session.id, id);
            return Ok(discarded);
        }

        if let Err(reason) = state_machine::validate_shape(&session) {
            tracing::warn!("Discarding inconsistent session {}: {}", id, reason);
            return Ok(discarded);
        }

        Ok(Loaded::Valid(session))
    }

    /// Trusted session under `id`, if any.
    pub async fn load(&self, id: Uuid) -> Result<Option<AssessmentSession>> {
        Ok(self.fetch(id).await?.into_session())
    }

    pub async fn clear(&self, id: Uuid) -> Result<()> {
        self.store.delete(&Self::key(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session_store::MemorySessionStore;
    use chrono::Utc;

    fn persistence() -> (Arc<MemorySessionStore>, SessionPersistence) {
        let store = Arc::new(MemorySessionStore::new());
        (store.clone(), SessionPersistence::new(store))
    }

    #[tokio::test]
    async fn saved_session_loads_back() {
        let (_, persistence) = persistence();
        let session = AssessmentSession::new(Utc::now());

        assert_eq!(persistence.save(&session).await.unwrap(), SaveOutcome::Stored);
        let loaded = persistence.load(session.id).await.unwrap();
        assert_eq!(loaded, Some(session));
    }

    #[tokio::test]
    async fn missing_or_malformed_records_load_as_none() {
        let (store, persistence) = persistence();
        let id = Uuid::new_v4();
        assert!(persistence.load(id).await.unwrap().is_none());

        store
            .insert_raw(&SessionPersistence::key(id), 1, "{\"screen\":\"nowhere\"}")
            .await;
        assert!(persistence.load(id).await.unwrap().is_none());

        store.insert_raw(&SessionPersistence::key(id), 2, "][").await;
        assert!(persistence.load(id).await.unwrap().is_none());
        assert_eq!(
            persistence.fetch(id).await.unwrap(),
            Loaded::Discarded { revision: 2 }
        );
    }

    #[tokio::test]
    async fn record_under_foreign_key_is_discarded() {
        let (store, persistence) = persistence();
        let session = AssessmentSession::new(Utc::now());
        let other = Uuid::new_v4();
        store
            .insert_raw(
                &SessionPersistence::key(other),
                1,
                &serde_json::to_string(&session).unwrap(),
            )
            .await;

        assert!(persistence.load(other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn older_revision_never_overwrites_newer_state() {
        let (_, persistence) = persistence();
        let mut session = AssessmentSession::new(Utc::now());
        let stale = session.clone();

        session.revision = 2;
        persistence.save(&session).await.unwrap();
        assert_eq!(persistence.save(&stale).await.unwrap(), SaveOutcome::Stale);

        let loaded = persistence.load(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.revision, 2);
    }

    #[tokio::test]
    async fn clear_abandons_the_session() {
        let (_, persistence) = persistence();
        let session = AssessmentSession::new(Utc::now());
        persistence.save(&session).await.unwrap();
        persistence.clear(session.id).await.unwrap();
        assert!(persistence.load(session.id).await.unwrap().is_none());
    }
}
