use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::forms::{FormKind, Lead};

pub const LEAD_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct LeadSummary {
    pub total: usize,
    pub counts: BTreeMap<&'static str, usize>,
    pub leads: Vec<Lead>,
}

/// Recent accepted submissions, newest first. Process-local.
pub struct LeadLog {
    capacity: usize,
    entries: Mutex<VecDeque<Lead>>,
}

impl Default for LeadLog {
    fn default() -> Self {
        Self::with_capacity(LEAD_LOG_CAPACITY)
    }
}

impl LeadLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub async fn record(&self, lead: Lead) {
        let mut entries = self.entries.lock().await;
        entries.push_front(lead);
        entries.truncate(self.capacity);
    }

    pub async fn summary(&self) -> LeadSummary {
        let entries = self.entries.lock().await;

        let mut counts: BTreeMap<&'static str, usize> = [
            FormKind::Contact,
            FormKind::DemoRequest,
            FormKind::CertificateValidation,
        ]
        .iter()
        .map(|kind| (kind.as_str(), 0))
        .collect();
        for lead in entries.iter() {
            *counts.entry(lead.kind.as_str()).or_default() += 1;
        }

        LeadSummary {
            total: entries.len(),
            counts,
            leads: entries.iter().cloned().collect(),
        }
    }
}
