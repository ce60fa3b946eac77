//! Static item bank of the emotional intelligence self-assessment.
//!
//! Items are stored round-robin across categories so any prefix of the
//! bank stays balanced. The quick variant takes the first two items of
//! every category, which keeps it a stable subset of the standard one.

use crate::errors::AssessmentError;
use crate::models::{Category, Direction, QuestionDefinition, Variant};

const fn q(
    id: &'static str,
    category: Category,
    direction: Direction,
    text: &'static str,
) -> QuestionDefinition {
    QuestionDefinition {
        id,
        text,
        category,
        direction,
    }
}

use Category::{Empathy, Motivation, SelfAwareness, SelfRegulation, SocialSkills};
use Direction::{Forward, Reverse};

static BANK: [QuestionDefinition; 50] = [
    // round 1
    q("sa-01", SelfAwareness, Forward, "I can name the emotion I am feeling as it happens."),
    q("sr-01", SelfRegulation, Forward, "I stay calm when plans change at the last minute."),
    q("mo-01", Motivation, Forward, "I set personal goals that stretch my abilities."),
    q("em-01", Empathy, Forward, "I notice when someone is upset even if they do not say so."),
    q("ss-01", SocialSkills, Forward, "I find it easy to start conversations with new people."),
    // round 2
    q("sa-02", SelfAwareness, Reverse, "My mood often surprises me."),
    q("sr-02", SelfRegulation, Reverse, "I say things in anger that I later regret."),
    q("mo-02", Motivation, Reverse, "I give up quickly when a task becomes difficult."),
    q("em-02", Empathy, Reverse, "Other people's problems rarely affect me."),
    q("ss-02", SocialSkills, Reverse, "I avoid group discussions whenever I can."),
    // round 3
    q("sa-03", SelfAwareness, Forward, "I know which situations drain my energy."),
    q("sr-03", SelfRegulation, Forward, "I can put aside frustration to finish important work."),
    q("mo-03", Motivation, Forward, "I keep working toward a goal even without outside reward."),
    q("em-03", Empathy, Forward, "I can see a disagreement from the other person's side."),
    q("ss-03", SocialSkills, Forward, "People ask me to help settle disagreements."),
    // round 4
    q("sa-04", SelfAwareness, Forward, "I understand how my feelings influence my decisions."),
    q("sr-04", SelfRegulation, Forward, "I think before reacting when someone criticises me."),
    q("mo-04", Motivation, Forward, "Setbacks make me more determined."),
    q("em-04", Empathy, Forward, "I adjust how I speak depending on how others are feeling."),
    q("ss-04", SocialSkills, Forward, "I build rapport quickly with colleagues."),
    // round 5
    q("sa-05", SelfAwareness, Reverse, "I find it hard to explain why I feel the way I do."),
    q("sr-05", SelfRegulation, Reverse, "Stress makes me lose focus for the rest of the day."),
    q("mo-05", Motivation, Reverse, "I need someone else to push me to start new things."),
    q("em-05", Empathy, Reverse, "I get impatient when people share their worries."),
    q("ss-05", SocialSkills, Reverse, "I struggle to work with people whose style differs from mine."),
    // round 6
    q("sa-06", SelfAwareness, Forward, "I am aware of my strengths and weaknesses."),
    q("sr-06", SelfRegulation, Forward, "I can calm myself down when I feel anxious."),
    q("mo-06", Motivation, Forward, "I look for ways to improve how I work."),
    q("em-06", Empathy, Forward, "I listen carefully before offering advice."),
    q("ss-06", SocialSkills, Forward, "I can persuade others without pressuring them."),
    // round 7
    q("sa-07", SelfAwareness, Forward, "I ask others for honest feedback about my behaviour."),
    q("sr-07", SelfRegulation, Forward, "I keep my commitments even when I do not feel like it."),
    q("mo-07", Motivation, Forward, "I stay optimistic when a project runs into trouble."),
    q("em-07", Empathy, Forward, "I pick up on the mood of a room quickly."),
    q("ss-07", SocialSkills, Forward, "I give credit to others for shared successes."),
    // round 8
    q("sa-08", SelfAwareness, Reverse, "I am often unsure what I really want."),
    q("sr-08", SelfRegulation, Reverse, "I act on impulse and regret it afterwards."),
    q("mo-08", Motivation, Reverse, "I lose interest in goals that take a long time."),
    q("em-08", Empathy, Reverse, "I find it hard to understand why others react emotionally."),
    q("ss-08", SocialSkills, Reverse, "I let conflicts go unresolved rather than address them."),
    // round 9
    q("sa-09", SelfAwareness, Forward, "I notice physical signs of stress in my body."),
    q("sr-09", SelfRegulation, Forward, "I adapt easily to new rules or procedures."),
    q("mo-09", Motivation, Forward, "I take initiative without waiting to be asked."),
    q("em-09", Empathy, Forward, "I respect feelings that differ from my own."),
    q("ss-09", SocialSkills, Forward, "I enjoy coordinating people toward a shared goal."),
    // round 10
    q("sa-10", SelfAwareness, Forward, "I can laugh at my own mistakes."),
    q("sr-10", SelfRegulation, Forward, "I recover quickly after a disappointment."),
    q("mo-10", Motivation, Forward, "I take pride in doing work to a high standard."),
    q("em-10", Empathy, Forward, "People come to me when they need someone to talk to."),
    q("ss-10", SocialSkills, Forward, "I can give difficult feedback in a constructive way."),
];

/// Ordered questions of `variant`.
pub fn questions(variant: Variant) -> Vec<&'static QuestionDefinition> {
    let per_category = variant.questions_per_category();
    let mut taken = [0usize; Category::ALL.len()];

    BANK.iter()
        .filter(|question| {
            let slot = category_slot(question.category);
            if taken[slot] < per_category {
                taken[slot] += 1;
                true
            } else {
                false
            }
        })
        .collect()
}

/// Resolves a variant tag and returns its questions.
pub fn questions_for_tag(tag: &str) -> Result<Vec<&'static QuestionDefinition>, AssessmentError> {
    let variant: Variant = tag.parse()?;
    Ok(questions(variant))
}

pub fn question_at(variant: Variant, index: usize) -> Option<&'static QuestionDefinition> {
    questions(variant).into_iter().nth(index)
}

pub fn find(question_id: &str) -> Option<&'static QuestionDefinition> {
    BANK.iter().find(|question| question.id == question_id)
}

fn category_slot(category: Category) -> usize {
    Category::ALL
        .iter()
        .position(|c| *c == category)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn every_variant_has_declared_count_without_duplicates() {
        for variant in Variant::ALL {
            let items = questions(variant);
            assert!(!items.is_empty());
            assert_eq!(items.len(), variant.question_count());

            let ids: HashSet<_> = items.iter().map(|q| q.id).collect();
            assert_eq!(ids.len(), items.len(), "duplicate ids in {}", variant);
        }
    }

    #[test]
    fn categories_are_balanced_per_variant() {
        for variant in Variant::ALL {
            let mut counts: HashMap<Category, usize> = HashMap::new();
            for question in questions(variant) {
                *counts.entry(question.category).or_default() += 1;
            }
            assert_eq!(counts.len(), Category::ALL.len());
            assert!(counts
                .values()
                .all(|count| *count == variant.questions_per_category()));
        }
    }

    #[test]
    fn quick_is_a_stable_ordered_subset_of_standard() {
        let quick: Vec<_> = questions(Variant::Quick).iter().map(|q| q.id).collect();
        let standard: Vec<_> = questions(Variant::Standard).iter().map(|q| q.id).collect();

        let positions: Vec<_> = quick
            .iter()
            .map(|id| standard.iter().position(|s| s == id).expect("quick item in standard"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let again: Vec<_> = questions(Variant::Quick).iter().map(|q| q.id).collect();
        assert_eq!(quick, again);
    }

    #[test]
    fn invalid_tag_fails_with_configuration_error() {
        assert!(matches!(
            questions_for_tag("marathon"),
            Err(AssessmentError::UnknownVariant(_))
        ));
        assert_eq!(questions_for_tag("quick").unwrap().len(), 10);
    }

    #[test]
    fn lookup_by_id_and_position() {
        assert_eq!(find("em-05").map(|q| q.direction), Some(Direction::Reverse));
        assert!(find("zz-01").is_none());
        assert_eq!(question_at(Variant::Quick, 9).map(|q| q.id), Some("ss-02"));
        assert!(question_at(Variant::Quick, 10).is_none());
    }
}
