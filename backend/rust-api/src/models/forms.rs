use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Contact,
    DemoRequest,
    CertificateValidation,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::Contact => "contact",
            FormKind::DemoRequest => "demo_request",
            FormKind::CertificateValidation => "certificate_validation",
        }
    }
}

/// Inbound form whose required fields must be non-blank.
pub trait RequiredFields {
    /// Names of required fields that are missing or blank.
    fn missing_fields(&self) -> Vec<&'static str>;
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ContactRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 5000, message = "Message must be at most 5000 characters"))]
    pub message: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
}

impl RequiredFields for ContactRequest {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.name) {
            missing.push("name");
        }
        if blank(&self.email) {
            missing.push("email");
        }
        if blank(&self.message) {
            missing.push("message");
        }
        missing
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DemoRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub organization: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    #[validate(range(min = 1, max = 1_000_000, message = "Learner count must be positive"))]
    pub learners: Option<u32>,
    pub message: Option<String>,
}

impl RequiredFields for DemoRequest {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.name) {
            missing.push("name");
        }
        if blank(&self.email) {
            missing.push("email");
        }
        missing
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CertificateValidationRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default, alias = "certificateId")]
    pub certificate_id: String,
}

impl RequiredFields for CertificateValidationRequest {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.email) {
            missing.push("email");
        }
        if blank(&self.certificate_id) {
            missing.push("certificate_id");
        }
        missing
    }
}

/// Accepted form submission, shown on the admin view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub kind: FormKind,
    pub name: Option<String>,
    pub email: String,
    pub summary: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormAccepted {
    pub message: String,
    pub reference: Uuid,
}
