use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    assessment::{QuestionView, Variant},
    attempt::{AttemptState, AttemptStatus},
    score::ScoreReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Landing,
    StudentInfo,
    Instructions,
    Test,
    Results,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Landing => "landing",
            Screen::StudentInfo => "student_info",
            Screen::Instructions => "instructions",
            Screen::Test => "test",
            Screen::Results => "results",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// Identifying details collected before the instructions screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct StudentInfoForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub organization: Option<String>,
}

impl StudentInfoForm {
    /// Trims every field and drops optional fields left blank.
    pub fn normalized(self) -> Self {
        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: optional(self.phone),
            organization: optional(self.organization),
        }
    }
}

impl From<StudentInfoForm> for StudentInfo {
    fn from(form: StudentInfoForm) -> Self {
        Self {
            name: form.name,
            email: form.email,
            phone: form.phone,
            organization: form.organization,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssessmentAction {
    SelectVariant { variant: String },
    SubmitStudentInfo(StudentInfoForm),
    StartTest,
    Answer { question_id: String, value: u8 },
    PreviousQuestion,
    FinishTest,
    Retake,
}

impl AssessmentAction {
    pub fn name(&self) -> &'static str {
        match self {
            AssessmentAction::SelectVariant { .. } => "select-variant",
            AssessmentAction::SubmitStudentInfo(_) => "submit-student-info",
            AssessmentAction::StartTest => "start-test",
            AssessmentAction::Answer { .. } => "answer",
            AssessmentAction::PreviousQuestion => "previous-question",
            AssessmentAction::FinishTest => "finish-test",
            AssessmentAction::Retake => "retake",
        }
    }
}

/// Persisted state of one visitor's way through the assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub id: Uuid,
    pub screen: Screen,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub student: Option<StudentInfo>,
    #[serde(default)]
    pub attempt: Option<AttemptState>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentSession {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            screen: Screen::Landing,
            variant: None,
            student: None,
            attempt: None,
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn attempt_status(&self) -> AttemptStatus {
        self.attempt
            .as_ref()
            .map(|attempt| attempt.status)
            .unwrap_or(AttemptStatus::NotStarted)
    }

    /// Drops the attempt and everything collected for it.
    pub fn reset_to_landing(&mut self) {
        self.screen = Screen::Landing;
        self.variant = None;
        self.student = None;
        self.attempt = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionsView {
    pub variant: Variant,
    pub question_count: usize,
    pub duration_seconds: i64,
    pub scale_min: u8,
    pub scale_max: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptView {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub current_index: usize,
    pub question_count: usize,
    pub answered_count: usize,
    pub current_question: Option<QuestionView>,
    pub current_answer: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentView {
    pub session_id: Uuid,
    pub screen: Screen,
    pub variant: Option<Variant>,
    pub revision: u64,
    pub student_name: Option<String>,
    pub instructions: Option<InstructionsView>,
    pub attempt: Option<AttemptView>,
    pub result: Option<ScoreReport>,
}
