use std::collections::HashMap;

use crate::errors::AssessmentError;
use crate::models::{
    AttemptState, Band, Category, CategoryScore, Direction, QuestionDefinition, ScoreReport,
    RESPONSE_MAX, RESPONSE_MIN,
};

/// Direction-adjusted contribution of a raw response.
pub fn contribution(direction: Direction, raw: u8) -> u8 {
    match direction {
        Direction::Forward => raw,
        Direction::Reverse => RESPONSE_MAX + RESPONSE_MIN - raw,
    }
}

/// Per-category scores of `attempt` over `questions`.
///
/// Unanswered questions contribute the scale minimum. Fails when an answer
/// points at a question outside `questions` or carries an off-scale value.
pub fn score(
    attempt: &AttemptState,
    questions: &[&QuestionDefinition],
) -> Result<Vec<CategoryScore>, AssessmentError> {
    let by_id: HashMap<&str, &QuestionDefinition> =
        questions.iter().map(|q| (q.id, *q)).collect();

    for entry in attempt.answers.iter() {
        if !by_id.contains_key(entry.question_id.as_str()) {
            return Err(AssessmentError::Integrity(format!(
                "answer references unknown question '{}' for {} variant",
                entry.question_id, attempt.variant
            )));
        }
        if !(RESPONSE_MIN..=RESPONSE_MAX).contains(&entry.value) {
            return Err(AssessmentError::Integrity(format!(
                "answer to '{}' is off scale: {}",
                entry.question_id, entry.value
            )));
        }
    }

    let scores = Category::ALL
        .iter()
        .filter_map(|category| {
            let items: Vec<_> = questions
                .iter()
                .filter(|q| q.category == *category)
                .collect();
            if items.is_empty() {
                return None;
            }

            let mut total = 0u32;
            let mut answered = 0usize;
            for question in &items {
                match attempt.answers.get(question.id) {
                    Some(raw) => {
                        answered += 1;
                        total += u32::from(contribution(question.direction, raw));
                    }
                    None => total += u32::from(RESPONSE_MIN),
                }
            }

            let count = items.len() as u32;
            let min = count * u32::from(RESPONSE_MIN);
            let max = count * u32::from(RESPONSE_MAX);
            Some(CategoryScore {
                category: *category,
                label: category.label().to_string(),
                score: total,
                min,
                max,
                answered,
                question_count: items.len(),
                band: Band::for_range(total, min, max),
            })
        })
        .collect();

    Ok(scores)
}

/// Full report: category scores plus totals and the overall band.
pub fn report(
    attempt: &AttemptState,
    questions: &[&QuestionDefinition],
) -> Result<ScoreReport, AssessmentError> {
    let categories = score(attempt, questions)?;

    let total = categories.iter().map(|c| c.score).sum();
    let total_min = categories.iter().map(|c| c.min).sum();
    let total_max = categories.iter().map(|c| c.max).sum();
    let band = Band::for_range(total, total_min, total_max);

    Ok(ScoreReport {
        variant: attempt.variant,
        status: attempt.status,
        categories,
        total,
        total_min,
        total_max,
        band,
        band_summary: band.summary().to_string(),
        scale_max: attempt.variant.category_scale_max(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptStatus, Variant};
    use crate::services::question_bank;
    use chrono::{Duration, Utc};

    fn answered_with(variant: Variant, value: impl Fn(&QuestionDefinition) -> u8) -> AttemptState {
        let now = Utc::now();
        let mut attempt = AttemptState::begin(variant, now, Duration::minutes(30));
        for question in question_bank::questions(variant) {
            attempt.answers.upsert(question.id, value(question), now);
        }
        attempt
    }

    #[test]
    fn reverse_items_mirror_forward_items() {
        assert_eq!(contribution(Direction::Reverse, RESPONSE_MAX), RESPONSE_MIN);
        assert_eq!(contribution(Direction::Reverse, RESPONSE_MIN), RESPONSE_MAX);
        assert_eq!(
            contribution(Direction::Reverse, RESPONSE_MAX),
            contribution(Direction::Forward, RESPONSE_MIN)
        );
        assert_eq!(contribution(Direction::Reverse, 3), 3);
        assert_eq!(contribution(Direction::Forward, 4), 4);
    }

    #[test]
    fn lowest_and_highest_responses_hit_category_bounds() {
        for variant in Variant::ALL {
            let questions = question_bank::questions(variant);

            // direction-aware: pick the raw value that yields the minimum contribution
            let lowest = answered_with(variant, |q| match q.direction {
                Direction::Forward => RESPONSE_MIN,
                Direction::Reverse => RESPONSE_MAX,
            });
            for category in score(&lowest, &questions).unwrap() {
                assert_eq!(category.score, category.min);
                assert_eq!(category.band, Band::Low);
            }

            let highest = answered_with(variant, |q| match q.direction {
                Direction::Forward => RESPONSE_MAX,
                Direction::Reverse => RESPONSE_MIN,
            });
            for category in score(&highest, &questions).unwrap() {
                assert_eq!(category.score, category.max);
                assert_eq!(category.max, variant.category_scale_max());
                assert_eq!(category.band, Band::High);
            }
        }
    }

    #[test]
    fn rubric_maxima_match_declared_chart_scale() {
        for variant in Variant::ALL {
            let questions = question_bank::questions(variant);
            let attempt = answered_with(variant, |_| 3);
            let report = report(&attempt, &questions).unwrap();

            assert_eq!(report.scale_max, variant.category_scale_max());
            assert!(report.categories.iter().all(|c| c.max == report.scale_max));
            assert_eq!(report.total_max, variant.full_scale_max());
        }
    }

    #[test]
    fn scoring_is_idempotent() {
        let questions = question_bank::questions(Variant::Standard);
        let attempt = answered_with(Variant::Standard, |q| (q.id.len() % 5) as u8 + 1);
        let first = report(&attempt, &questions).unwrap();
        let second = report(&attempt, &questions).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unanswered_questions_score_the_scale_minimum() {
        let questions = question_bank::questions(Variant::Quick);
        let now = Utc::now();
        let mut attempt = AttemptState::begin(Variant::Quick, now, Duration::minutes(5));
        // one forward item answered at max, everything else missing
        attempt.answers.upsert("sa-01", 5, now);
        attempt.finish(AttemptStatus::Expired, now);

        let scores = score(&attempt, &questions).unwrap();
        let awareness = &scores[0];
        assert_eq!(awareness.category, Category::SelfAwareness);
        assert_eq!(awareness.score, 5 + 1);
        assert_eq!(awareness.answered, 1);
        assert!(scores[1..].iter().all(|c| c.score == c.min && c.answered == 0));
    }

    #[test]
    fn cross_variant_answer_is_an_integrity_error() {
        let questions = question_bank::questions(Variant::Quick);
        let now = Utc::now();
        let mut attempt = AttemptState::begin(Variant::Quick, now, Duration::minutes(5));
        attempt.answers.upsert("ss-10", 4, now);

        assert!(matches!(
            score(&attempt, &questions),
            Err(AssessmentError::Integrity(_))
        ));
    }

    #[test]
    fn off_scale_answer_is_an_integrity_error() {
        let questions = question_bank::questions(Variant::Quick);
        let now = Utc::now();
        let mut attempt = AttemptState::begin(Variant::Quick, now, Duration::minutes(5));
        attempt.answers.upsert("sa-01", 9, now);

        assert!(matches!(
            report(&attempt, &questions),
            Err(AssessmentError::Integrity(_))
        ));
    }
}
