use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::config::{Config, StoreBackend};
use crate::middlewares::rate_limit::FixedWindowLimiter;

use self::assessment_service::AssessmentService;
use self::form_service::FormService;
use self::lead_log::LeadLog;
use self::mail_relay::{MailRelay, SmtpMailRelay};
use self::persistence::SessionPersistence;
use self::session_store::{
    FileSessionStore, MemorySessionStore, RedisSessionStore, SessionStore,
};

pub struct AppState {
    pub config: Config,
    pub sessions: SessionPersistence,
    pub assessments: AssessmentService,
    pub forms: FormService,
    pub leads: Arc<LeadLog>,
    pub form_limiter: FixedWindowLimiter,
    pub assessment_limiter: FixedWindowLimiter,
}

const STORE_PURGE_INTERVAL: Duration = Duration::from_secs(600);

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn SessionStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(MemorySessionStore::with_ttl(config.session_ttl_seconds)),
            StoreBackend::File => Arc::new(FileSessionStore::with_ttl(
                &config.store_dir,
                config.session_ttl_seconds,
            )),
            StoreBackend::Redis => {
                let uri = config
                    .redis_uri
                    .as_deref()
                    .context("REDIS_URI is required for the redis session store")?;
                Arc::new(RedisSessionStore::connect(uri, config.session_ttl_seconds).await?)
            }
        };
        store
            .ping()
            .await
            .with_context(|| format!("Session store '{}' is not reachable", store.backend_name()))?;
        tracing::info!("Session store ready: {}", store.backend_name());
        spawn_store_purge(store.clone());

        let mailer = SmtpMailRelay::new(config.email.clone())?;

        Ok(Self::with_components(config, store, Arc::new(mailer)))
    }

    /// Wires the services around an already built store and mail relay.
    pub fn with_components(
        config: Config,
        store: Arc<dyn SessionStore>,
        mailer: Arc<dyn MailRelay>,
    ) -> Self {
        let sessions = SessionPersistence::new(store);
        let leads = Arc::new(LeadLog::new());

        Self {
            assessments: AssessmentService::new(sessions.clone(), config.assessment.clone()),
            forms: FormService::new(
                mailer,
                leads.clone(),
                config.admin_email.clone(),
                config.site_name.clone(),
            ),
            form_limiter: FixedWindowLimiter::per_minute(config.form_rate_limit_per_minute),
            assessment_limiter: FixedWindowLimiter::per_minute(
                config.assessment_rate_limit_per_minute,
            ),
            sessions,
            leads,
            config,
        }
    }
}

/// Periodically drops expired sessions from stores without native expiry.
fn spawn_store_purge(store: Arc<dyn SessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STORE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!("Purged {} expired sessions from {}", removed, store.backend_name())
                }
                Err(e) => tracing::warn!("Session purge failed: {:#}", e),
            }
        }
    });
}

pub mod assessment_service;
pub mod form_service;
pub mod lead_log;
pub mod mail_relay;
pub mod page_catalog;
pub mod persistence;
pub mod question_bank;
pub mod radar_chart;
pub mod scoring;
pub mod session_store;
pub mod state_machine;
