use std::collections::{BTreeMap, BTreeSet};

use super::QuizQuestion;

/// A question is correct only when the learner's set equals the correct set.
/// No partial credit.
#[must_use]
pub fn is_exact_match(answers: Option<&BTreeSet<String>>, question: &QuizQuestion) -> bool {
    match answers {
        Some(given) => *given == question.correct_answers,
        None => question.correct_answers.is_empty(),
    }
}

/// Percentage of points earned, rounded half up. Zero when the quiz is worth
/// zero points.
#[must_use]
pub fn score_quiz(
    questions: &[QuizQuestion],
    answers: &BTreeMap<String, BTreeSet<String>>,
) -> u32 {
    let mut total: u64 = 0;
    let mut earned: u64 = 0;
    for question in questions {
        let points = u64::from(question.points);
        total += points;
        if is_exact_match(answers.get(&question.id), question) {
            earned += points;
        }
    }
    if total == 0 {
        return 0;
    }
    // round(100 * earned / total) in integers
    let pct = (200 * earned + total) / (2 * total);
    u32::try_from(pct).unwrap_or(100)
}
