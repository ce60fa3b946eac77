use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AssessmentError;

/// Lowest raw response on the Likert scale.
pub const RESPONSE_MIN: u8 = 1;
/// Highest raw response on the Likert scale.
pub const RESPONSE_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Quick,
    Standard,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Quick, Variant::Standard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Quick => "quick",
            Variant::Standard => "standard",
        }
    }

    pub fn question_count(&self) -> usize {
        match self {
            Variant::Quick => 10,
            Variant::Standard => 50,
        }
    }

    /// Questions drawn from each category.
    pub fn questions_per_category(&self) -> usize {
        self.question_count() / Category::ALL.len()
    }

    /// Fixed per-category maximum the radar chart is drawn against.
    pub fn category_scale_max(&self) -> u32 {
        match self {
            Variant::Quick => 10,
            Variant::Standard => 50,
        }
    }

    pub fn full_scale_max(&self) -> u32 {
        self.category_scale_max() * Category::ALL.len() as u32
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = AssessmentError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Variant::Quick),
            "standard" => Ok(Variant::Standard),
            _ => Err(AssessmentError::UnknownVariant(tag.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SelfAwareness,
    SelfRegulation,
    Motivation,
    Empathy,
    SocialSkills,
}

impl Category {
    /// Display order used by reports and the radar chart.
    pub const ALL: [Category; 5] = [
        Category::SelfAwareness,
        Category::SelfRegulation,
        Category::Motivation,
        Category::Empathy,
        Category::SocialSkills,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::SelfAwareness => "Self-awareness",
            Category::SelfRegulation => "Self-regulation",
            Category::Motivation => "Motivation",
            Category::Empathy => "Empathy",
            Category::SocialSkills => "Social skills",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    /// A high raw response lowers the category score.
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionDefinition {
    pub id: &'static str,
    pub text: &'static str,
    pub category: Category,
    pub direction: Direction,
}

/// Question as shown on the test screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub category_label: String,
    pub position: usize,
    pub scale_min: u8,
    pub scale_max: u8,
}

impl QuestionView {
    pub fn new(question: &QuestionDefinition, position: usize) -> Self {
        Self {
            id: question.id.to_string(),
            text: question.text.to_string(),
            category: question.category,
            category_label: question.category.label().to_string(),
            position,
            scale_min: RESPONSE_MIN,
            scale_max: RESPONSE_MAX,
        }
    }
}
