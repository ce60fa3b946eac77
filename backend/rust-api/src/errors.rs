use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const RETRY_LATER_MESSAGE: &str =
    "We could not process your request right now. Please try again later.";

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Unknown assessment variant: {0}")]
    UnknownVariant(String),

    #[error("{message}")]
    Validation {
        message: String,
        fields: FieldErrors,
    },

    #[error("Action '{action}' is not allowed on the {screen} screen")]
    InvalidTransition {
        screen: &'static str,
        action: &'static str,
    },

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Session was modified by another request; reload and try again")]
    StaleRevision,

    #[error("Assessment session not found")]
    NotFound,

    #[error("Session storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AssessmentError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        AssessmentError::Validation { message, fields }
    }
}

impl From<validator::ValidationErrors> for AssessmentError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AssessmentError::Validation {
            message: "Please correct the highlighted fields".to_string(),
            fields: field_errors(&errors),
        }
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{message}")]
    Invalid {
        message: String,
        fields: FieldErrors,
    },

    #[error("Mail relay failed: {0:#}")]
    Relay(#[source] anyhow::Error),
}

impl FormError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        FormError::Invalid { message, fields }
    }
}

impl From<validator::ValidationErrors> for FormError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = field_errors(&errors);
        // surface the first field message so the form can show it as-is
        let message = fields
            .values()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "Invalid form submission".to_string());
        FormError::Invalid { message, fields }
    }
}

/// Flattens validator output into `field -> messages`.
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Error returned by HTTP handlers, rendered as `{"message", "status", "fields"?}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub fields: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn retry_later() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, RETRY_LATER_MESSAGE)
    }

    pub fn with_fields(mut self, fields: FieldErrors) -> Self {
        self.fields = Some(fields);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "message": self.message,
            "status": self.status.as_u16(),
        });
        if let Some(fields) = self.fields {
            body["fields"] = json!(fields);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<AssessmentError> for ApiError {
    fn from(err: AssessmentError) -> Self {
        match err {
            AssessmentError::UnknownVariant(_) => ApiError::bad_request(err.to_string()),
            AssessmentError::Validation { message, fields } => {
                ApiError::bad_request(message).with_fields(fields)
            }
            AssessmentError::InvalidTransition { .. } | AssessmentError::StaleRevision => {
                ApiError::conflict(err.to_string())
            }
            AssessmentError::NotFound => ApiError::not_found(err.to_string()),
            AssessmentError::Integrity(ref detail) => {
                tracing::error!("Assessment integrity error: {}", detail);
                ApiError::retry_later()
            }
            AssessmentError::Storage(ref source) => {
                tracing::error!("Assessment storage error: {:#}", source);
                ApiError::retry_later()
            }
        }
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::MissingFields(_) => ApiError::bad_request(err.to_string()),
            FormError::Invalid { message, fields } => {
                ApiError::bad_request(message).with_fields(fields)
            }
            FormError::Relay(ref source) => {
                tracing::error!("Form mail relay error: {:#}", source);
                ApiError::retry_later()
            }
        }
    }
}
