use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;
use validator::Validate;

use crate::errors::FormError;
use crate::metrics::FORM_SUBMISSIONS_TOTAL;
use crate::models::forms::{
    CertificateValidationRequest, ContactRequest, DemoRequest, FormAccepted, FormKind, Lead,
    RequiredFields,
};
use crate::services::lead_log::LeadLog;
use crate::services::mail_relay::{escape_html, MailRelay, OutgoingMail};

lazy_static! {
    static ref CERTIFICATE_ID_REGEX: Regex = Regex::new(r"^[A-Z0-9-]{6,32}$").unwrap();
}

/// Normalized submission ready to be mailed and logged.
struct Submission {
    kind: FormKind,
    name: Option<String>,
    email: String,
    /// `(label, value)` rows for the admin notification, already trimmed.
    rows: Vec<(&'static str, String)>,
    summary: String,
}

/// Turns accepted form submissions into two mails and a lead entry.
pub struct FormService {
    mailer: Arc<dyn MailRelay>,
    leads: Arc<LeadLog>,
    admin_email: String,
    site_name: String,
}

impl FormService {
    pub fn new(
        mailer: Arc<dyn MailRelay>,
        leads: Arc<LeadLog>,
        admin_email: impl Into<String>,
        site_name: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            leads,
            admin_email: admin_email.into(),
            site_name: site_name.into(),
        }
    }

    pub async fn submit_contact(
        &self,
        request: ContactRequest,
        now: DateTime<Utc>,
    ) -> Result<FormAccepted, FormError> {
        check(FormKind::Contact, &request)?;

        let mut rows = vec![
            ("Name", request.name.trim().to_string()),
            ("Email", request.email.trim().to_string()),
        ];
        push_optional(&mut rows, "Phone", request.phone);
        push_optional(&mut rows, "Subject", request.subject.clone());
        rows.push(("Message", request.message.trim().to_string()));

        let summary = request
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| truncate(request.message.trim(), 120));

        self.accept(
            Submission {
                kind: FormKind::Contact,
                name: Some(request.name.trim().to_string()),
                email: request.email.trim().to_string(),
                rows,
                summary,
            },
            now,
        )
        .await
    }

    pub async fn submit_demo_request(
        &self,
        request: DemoRequest,
        now: DateTime<Utc>,
    ) -> Result<FormAccepted, FormError> {
        check(FormKind::DemoRequest, &request)?;

        let mut rows = vec![
            ("Name", request.name.trim().to_string()),
            ("Email", request.email.trim().to_string()),
        ];
        push_optional(&mut rows, "Organization", request.organization.clone());
        push_optional(&mut rows, "Role", request.role);
        push_optional(&mut rows, "Phone", request.phone);
        if let Some(learners) = request.learners {
            rows.push(("Learners", learners.to_string()));
        }
        push_optional(&mut rows, "Message", request.message);

        let summary = match request.organization.as_deref().map(str::trim) {
            Some(org) if !org.is_empty() => format!("Demo requested for {}", org),
            _ => "Demo requested".to_string(),
        };

        self.accept(
            Submission {
                kind: FormKind::DemoRequest,
                name: Some(request.name.trim().to_string()),
                email: request.email.trim().to_string(),
                rows,
                summary,
            },
            now,
        )
        .await
    }

    pub async fn validate_certificate(
        &self,
        request: CertificateValidationRequest,
        now: DateTime<Utc>,
    ) -> Result<FormAccepted, FormError> {
        check(FormKind::CertificateValidation, &request)?;

        let certificate_id = request.certificate_id.trim().to_ascii_uppercase();
        if !CERTIFICATE_ID_REGEX.is_match(&certificate_id) {
            record(FormKind::CertificateValidation, "invalid");
            return Err(FormError::invalid(
                "certificate_id",
                "Certificate ID must be 6-32 letters, digits or dashes",
            ));
        }

        self.accept(
            Submission {
                kind: FormKind::CertificateValidation,
                name: None,
                email: request.email.trim().to_string(),
                rows: vec![
                    ("Email", request.email.trim().to_string()),
                    ("Certificate ID", certificate_id.clone()),
                ],
                summary: format!("Certificate {}", certificate_id),
            },
            now,
        )
        .await
    }

    async fn accept(
        &self,
        submission: Submission,
        now: DateTime<Utc>,
    ) -> Result<FormAccepted, FormError> {
        let kind = submission.kind;
        let reference = Uuid::new_v4();

        let acknowledgement = OutgoingMail {
            to: submission.email.clone(),
            subject: format!("{}: {}", self.site_name, acknowledgement_subject(kind)),
            html: self.acknowledgement_html(&submission),
            reply_to: Some(self.admin_email.clone()),
        };
        let notification = OutgoingMail {
            to: self.admin_email.clone(),
            subject: format!("New {} from {}", kind_label(kind), submission.email),
            html: notification_html(&submission, reference),
            reply_to: Some(submission.email.clone()),
        };

        for mail in [acknowledgement, notification] {
            if let Err(e) = self.mailer.send(mail).await {
                record(kind, "relay_failed");
                return Err(FormError::Relay(e));
            }
        }

        self.leads
            .record(Lead {
                id: reference,
                kind,
                name: submission.name,
                email: submission.email,
                summary: submission.summary,
                received_at: now,
            })
            .await;

        record(kind, "accepted");
        tracing::info!(form = kind.as_str(), %reference, "Form submission accepted");

        Ok(FormAccepted {
            message: confirmation_message(kind).to_string(),
            reference,
        })
    }

    fn acknowledgement_html(&self, submission: &Submission) -> String {
        let greeting = submission
            .name
            .as_deref()
            .map(|name| format!("Hello {},", escape_html(name)))
            .unwrap_or_else(|| "Hello,".to_string());
        format!(
            "<p>{}</p><p>{}</p><p>{}</p>",
            greeting,
            escape_html(confirmation_message(submission.kind)),
            escape_html(&self.site_name)
        )
    }
}

/// Required fields first, then format validation.
fn check<T: RequiredFields + Validate>(kind: FormKind, request: &T) -> Result<(), FormError> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        record(kind, "missing_fields");
        return Err(FormError::MissingFields(missing));
    }
    if let Err(errors) = request.validate() {
        record(kind, "invalid");
        return Err(errors.into());
    }
    Ok(())
}

fn record(kind: FormKind, outcome: &str) {
    FORM_SUBMISSIONS_TOTAL
        .with_label_values(&[kind.as_str(), outcome])
        .inc();
}

fn push_optional(rows: &mut Vec<(&'static str, String)>, label: &'static str, value: Option<String>) {
    if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        rows.push((label, value));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

fn notification_html(submission: &Submission, reference: Uuid) -> String {
    let rows: String = submission
        .rows
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
                label,
                escape_html(value).replace('\n', "<br>")
            )
        })
        .collect();
    format!(
        "<h2>New {}</h2><table>{}</table><p>Reference: {}</p>",
        kind_label(submission.kind),
        rows,
        reference
    )
}

fn kind_label(kind: FormKind) -> &'static str {
    match kind {
        FormKind::Contact => "contact message",
        FormKind::DemoRequest => "demo request",
        FormKind::CertificateValidation => "certificate validation request",
    }
}

fn acknowledgement_subject(kind: FormKind) -> &'static str {
    match kind {
        FormKind::Contact => "we received your message",
        FormKind::DemoRequest => "your demo request",
        FormKind::CertificateValidation => "certificate validation request received",
    }
}

fn confirmation_message(kind: FormKind) -> &'static str {
    match kind {
        FormKind::Contact => "Thank you for your message. We will get back to you shortly.",
        FormKind::DemoRequest => "Thank you for your interest. Our team will contact you to schedule a demo.",
        FormKind::CertificateValidation => {
            "Your certificate validation request has been received. We will reply by email."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutgoingMail>>,
        fail: bool,
    }

    #[async_trait]
    impl MailRelay for Recorder {
        async fn send(&self, mail: OutgoingMail) -> Result<()> {
            if self.fail {
                anyhow::bail!("relay unavailable");
            }
            self.sent.lock().await.push(mail);
            Ok(())
        }
    }

    fn service(recorder: Arc<Recorder>, leads: Arc<LeadLog>) -> FormService {
        FormService::new(
            recorder,
            leads,
            "admissions@brightpath.example",
            "Brightpath Academy",
        )
    }

    fn contact(name: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.to_string(),
            email: "a@b.com".to_string(),
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn blank_required_field_is_rejected_without_mail() {
        let recorder = Arc::new(Recorder::default());
        let service = service(recorder.clone(), Arc::new(LeadLog::new()));

        let err = service
            .submit_contact(contact("", "hi"), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Missing required fields: name");
        assert!(recorder.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn accepted_contact_sends_ack_and_notification() {
        let recorder = Arc::new(Recorder::default());
        let leads = Arc::new(LeadLog::new());
        let service = service(recorder.clone(), leads.clone());

        let accepted = service
            .submit_contact(contact("Ada <script>", "hi"), Utc::now())
            .await
            .unwrap();

        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@b.com");
        assert_eq!(
            sent[0].reply_to.as_deref(),
            Some("admissions@brightpath.example")
        );
        assert_eq!(sent[1].to, "admissions@brightpath.example");
        assert_eq!(sent[1].reply_to.as_deref(), Some("a@b.com"));
        assert!(sent[1].html.contains("Ada &lt;script&gt;"));
        assert!(!sent[1].html.contains("<script>"));

        let summary = leads.summary().await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.leads[0].id, accepted.reference);
    }

    #[tokio::test]
    async fn malformed_email_is_a_validation_error() {
        let service = service(Arc::new(Recorder::default()), Arc::new(LeadLog::new()));
        let request = DemoRequest {
            name: "Grace".to_string(),
            email: "not-an-email".to_string(),
            ..Default::default()
        };

        let err = service
            .submit_demo_request(request, Utc::now())
            .await
            .unwrap_err();
        match err {
            FormError::Invalid { fields, .. } => assert!(fields.contains_key("email")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn certificate_id_is_uppercased_before_format_check() {
        let recorder = Arc::new(Recorder::default());
        let service = service(recorder.clone(), Arc::new(LeadLog::new()));

        let ok = CertificateValidationRequest {
            email: "a@b.com".to_string(),
            certificate_id: " bp-2024-00017 ".to_string(),
        };
        service.validate_certificate(ok, Utc::now()).await.unwrap();
        assert!(recorder.sent.lock().await[1].html.contains("BP-2024-00017"));

        let bad = CertificateValidationRequest {
            email: "a@b.com".to_string(),
            certificate_id: "abc".to_string(),
        };
        assert!(matches!(
            service.validate_certificate(bad, Utc::now()).await,
            Err(FormError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn relay_failure_surfaces_and_skips_lead() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let leads = Arc::new(LeadLog::new());
        let service = service(recorder, leads.clone());

        let err = service
            .submit_contact(contact("Ada", "hi"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, FormError::Relay(_)));
        assert_eq!(leads.summary().await.total, 0);
    }
}
