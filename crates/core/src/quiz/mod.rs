//! Quiz definitions, scoring, and the attempt state machine.

mod attempt;
mod scoring;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{InteractionKind, ModuleId};
use crate::scorm::LedgerError;

pub use attempt::{QuestionReview, QuizAttempt, QuizOutcome, QuizPhase};
pub use scoring::{is_exact_match, score_quiz};

/// Answering progress is held below this until the quiz is submitted.
pub const ANSWERING_PROGRESS_CAP: f64 = 95.0;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("max attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u32),

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(String),

    #[error("unknown question id: {0}")]
    UnknownQuestion(String),

    #[error("quiz is not in progress")]
    NotInProgress,

    #[error("quiz already started")]
    AlreadyStarted,

    #[error("current question has no answer")]
    UnansweredQuestion,

    #[error("already at the last question")]
    NoNextQuestion,

    #[error("no retry available")]
    RetryNotAllowed,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
    FillIn,
}

impl QuestionKind {
    /// Interaction type used when recording an answer to this kind.
    #[must_use]
    pub fn interaction_kind(self) -> InteractionKind {
        match self {
            Self::FillIn => InteractionKind::FillIn,
            Self::MultipleChoice | Self::MultipleSelect | Self::TrueFalse => {
                InteractionKind::Choice
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answers: BTreeSet<String>,
    #[serde(default)]
    pub explanation: String,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizModule {
    pub id: ModuleId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<QuizQuestion>,
    /// Countdown in minutes; `None` means untimed.
    #[serde(default)]
    pub time_limit: Option<u32>,
    pub passing_score: u32,
    pub max_attempts: u32,
}

impl QuizModule {
    /// # Errors
    ///
    /// Returns `QuizError` if there are no questions, question ids repeat,
    /// `max_attempts` is zero, or `passing_score` exceeds 100.
    pub fn validate(&self) -> Result<(), QuizError> {
        if self.questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        if self.max_attempts == 0 {
            return Err(QuizError::InvalidMaxAttempts);
        }
        if self.passing_score > 100 {
            return Err(QuizError::InvalidPassingScore(self.passing_score));
        }
        let mut seen = HashSet::new();
        for q in &self.questions {
            if !seen.insert(q.id.as_str()) {
                return Err(QuizError::DuplicateQuestion(q.id.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn question(&self, id: &str) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit.map(|m| m.saturating_mul(60))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn validation_catches_bad_definitions() {
        let mut quiz = four_by_25();
        assert!(quiz.validate().is_ok());

        quiz.max_attempts = 0;
        assert_eq!(quiz.validate(), Err(QuizError::InvalidMaxAttempts));

        let mut quiz = four_by_25();
        quiz.passing_score = 101;
        assert_eq!(quiz.validate(), Err(QuizError::InvalidPassingScore(101)));

        let mut quiz = four_by_25();
        quiz.questions.push(question("q1", &["a"], 5));
        assert_eq!(
            quiz.validate(),
            Err(QuizError::DuplicateQuestion("q1".into()))
        );

        let mut quiz = four_by_25();
        quiz.questions.clear();
        assert_eq!(quiz.validate(), Err(QuizError::NoQuestions));
    }

    #[test]
    fn deserializes_author_json() {
        let raw = r#"{
            "id": "quiz-1",
            "title": "Basics",
            "questions": [{
                "id": "q1",
                "type": "true-false",
                "question": "Is it?",
                "options": ["true", "false"],
                "correctAnswers": ["true"],
                "points": 10
            }],
            "timeLimit": 5,
            "passingScore": 70,
            "maxAttempts": 3
        }"#;
        let quiz: QuizModule = serde_json::from_str(raw).unwrap();
        assert_eq!(quiz.questions[0].kind, QuestionKind::TrueFalse);
        assert_eq!(quiz.time_limit_secs(), Some(300));
        assert!(quiz.validate().is_ok());
    }
}
