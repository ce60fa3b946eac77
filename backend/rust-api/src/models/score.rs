use serde::{Deserialize, Serialize};

use super::{
    assessment::{Category, Variant},
    attempt::AttemptStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Moderate,
    High,
}

impl Band {
    /// Band for `score` positioned inside `[min, max]`.
    pub fn for_range(score: u32, min: u32, max: u32) -> Self {
        if max <= min {
            return Band::Low;
        }
        let position = f64::from(score.saturating_sub(min)) / f64::from(max - min);
        if position < 0.4 {
            Band::Low
        } else if position < 0.7 {
            Band::Moderate
        } else {
            Band::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Band::Low => "Low",
            Band::Moderate => "Moderate",
            Band::High => "High",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Band::Low => "An area to build on. Targeted practice will make the biggest difference here.",
            Band::Moderate => "A solid base with room to grow through deliberate practice.",
            Band::High => "A clear strength you can lean on and help others develop.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub label: String,
    pub score: u32,
    pub min: u32,
    pub max: u32,
    pub answered: usize,
    pub question_count: usize,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub variant: Variant,
    pub status: AttemptStatus,
    pub categories: Vec<CategoryScore>,
    pub total: u32,
    pub total_min: u32,
    pub total_max: u32,
    pub band: Band,
    pub band_summary: String,
    /// Per-category maximum the chart is drawn against.
    pub scale_max: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_thresholds_follow_normalized_position() {
        // range 10..=50, width 40
        assert_eq!(Band::for_range(10, 10, 50), Band::Low);
        assert_eq!(Band::for_range(25, 10, 50), Band::Low);
        assert_eq!(Band::for_range(26, 10, 50), Band::Moderate);
        assert_eq!(Band::for_range(37, 10, 50), Band::Moderate);
        assert_eq!(Band::for_range(38, 10, 50), Band::High);
        assert_eq!(Band::for_range(50, 10, 50), Band::High);
    }

    #[test]
    fn degenerate_range_is_low() {
        assert_eq!(Band::for_range(3, 3, 3), Band::Low);
    }
}
