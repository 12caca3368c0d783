use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::model::{InteractionDraft, InteractionKind, InteractionResult, LessonStatus};
use crate::scorm::ProgressSink;

use super::scoring::{is_exact_match, score_quiz};
use super::{QuizError, QuizModule, ANSWERING_PROGRESS_CAP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub score: u32,
    pub passed: bool,
    /// Whole seconds from start (or retry) to submission.
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    NotStarted,
    InProgress,
    Submitted(QuizOutcome),
}

/// Per-question result shown after submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_id: String,
    pub given: BTreeSet<String>,
    pub correct_answers: BTreeSet<String>,
    pub correct: bool,
    pub explanation: String,
}

/// One learner working through a quiz, across retries.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    quiz: QuizModule,
    phase: QuizPhase,
    answers: BTreeMap<String, BTreeSet<String>>,
    current: usize,
    attempt_number: u32,
    remaining_secs: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    answer_seq: u64,
}

impl QuizAttempt {
    /// # Errors
    ///
    /// Returns the validation error of an ill-formed quiz.
    pub fn new(quiz: QuizModule) -> Result<Self, QuizError> {
        quiz.validate()?;
        let remaining_secs = quiz.time_limit_secs();
        Ok(Self {
            quiz,
            phase: QuizPhase::NotStarted,
            answers: BTreeMap::new(),
            current: 0,
            attempt_number: 1,
            remaining_secs,
            started_at: None,
            answer_seq: 0,
        })
    }

    #[must_use]
    pub fn quiz(&self) -> &QuizModule {
        &self.quiz
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        self.remaining_secs
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &str) -> Option<&BTreeSet<String>> {
        self.answers.get(question_id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    fn ensure_in_progress(&self) -> Result<(), QuizError> {
        if self.phase == QuizPhase::InProgress {
            Ok(())
        } else {
            Err(QuizError::NotInProgress)
        }
    }

    /// # Errors
    ///
    /// `QuizError::AlreadyStarted` unless the attempt has not started yet.
    pub fn start(&mut self, sink: &mut dyn ProgressSink) -> Result<(), QuizError> {
        if self.phase != QuizPhase::NotStarted {
            return Err(QuizError::AlreadyStarted);
        }
        self.begin(sink);
        Ok(())
    }

    fn begin(&mut self, sink: &mut dyn ProgressSink) {
        self.phase = QuizPhase::InProgress;
        self.started_at = Some(sink.now());
        sink.set_lesson_status(LessonStatus::Incomplete);
        sink.record_interaction(
            InteractionDraft::new(
                format!("quiz_start_{}_{}", self.quiz.id, self.attempt_number),
                InteractionKind::Choice,
                "quiz_started",
            )
            .with_correct(["started"])
            .with_result(InteractionResult::Correct),
        );
        debug!(quiz = %self.quiz.id, attempt = self.attempt_number, "quiz attempt started");
    }

    /// Replace the answer set for a question. An empty set clears it.
    ///
    /// Returns the answering progress pushed to the sink.
    ///
    /// # Errors
    ///
    /// `NotInProgress`, `UnknownQuestion`, or a ledger error from the sink.
    pub fn answer<I, S>(
        &mut self,
        question_id: &str,
        given: I,
        sink: &mut dyn ProgressSink,
    ) -> Result<f64, QuizError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_in_progress()?;
        let question = self
            .quiz
            .question(question_id)
            .ok_or_else(|| QuizError::UnknownQuestion(question_id.to_owned()))?;

        let given: BTreeSet<String> = given.into_iter().map(Into::into).collect();
        if given.is_empty() {
            self.answers.remove(question_id);
        } else {
            self.answer_seq += 1;
            let correct = is_exact_match(Some(&given), question);
            sink.record_interaction(
                InteractionDraft::new(
                    format!("question_{}_{}", question.id, self.answer_seq),
                    question.kind.interaction_kind(),
                    given.iter().cloned().collect::<Vec<_>>().join(","),
                )
                .with_correct(question.correct_answers.iter().cloned())
                .with_result(InteractionResult::from_match(correct)),
            );
            self.answers.insert(question_id.to_owned(), given);
        }

        #[allow(clippy::cast_precision_loss)]
        let progress = (self.answers.len() as f64 / self.quiz.questions.len() as f64 * 100.0)
            .min(ANSWERING_PROGRESS_CAP);
        sink.update_progress(&self.quiz.id, progress)?;
        Ok(progress)
    }

    /// Move forward. The current question must have an answer.
    ///
    /// # Errors
    ///
    /// `NotInProgress`, `UnansweredQuestion`, or `NoNextQuestion`.
    pub fn next(&mut self) -> Result<usize, QuizError> {
        self.ensure_in_progress()?;
        let current_id = &self.quiz.questions[self.current].id;
        if !self.answers.contains_key(current_id) {
            return Err(QuizError::UnansweredQuestion);
        }
        if self.current + 1 >= self.quiz.questions.len() {
            return Err(QuizError::NoNextQuestion);
        }
        self.current += 1;
        Ok(self.current)
    }

    /// # Errors
    ///
    /// `NotInProgress`.
    pub fn previous(&mut self) -> Result<usize, QuizError> {
        self.ensure_in_progress()?;
        self.current = self.current.saturating_sub(1);
        Ok(self.current)
    }

    /// One second of a timed quiz. Submits automatically when time runs out.
    ///
    /// # Errors
    ///
    /// Ledger errors from the automatic submission.
    pub fn tick(&mut self, sink: &mut dyn ProgressSink) -> Result<Option<QuizOutcome>, QuizError> {
        if self.phase != QuizPhase::InProgress {
            return Ok(None);
        }
        let Some(remaining) = self.remaining_secs else {
            return Ok(None);
        };
        let remaining = remaining.saturating_sub(1);
        self.remaining_secs = Some(remaining);
        if remaining == 0 {
            debug!(quiz = %self.quiz.id, "time limit reached");
            return self.submit(sink).map(Some);
        }
        Ok(None)
    }

    /// # Errors
    ///
    /// `NotInProgress`, or a ledger error from the sink.
    pub fn submit(&mut self, sink: &mut dyn ProgressSink) -> Result<QuizOutcome, QuizError> {
        self.ensure_in_progress()?;

        let score = score_quiz(&self.quiz.questions, &self.answers);
        let passed = score >= self.quiz.passing_score;
        let now = sink.now();
        let elapsed = self
            .started_at
            .map_or_else(Duration::zero, |started| {
                Duration::seconds((now - started).num_seconds().max(0))
            });

        sink.update_progress(&self.quiz.id, 100.0)?;
        sink.set_score(f64::from(score), 0.0, 100.0)?;
        sink.set_lesson_status(if passed {
            LessonStatus::Passed
        } else {
            LessonStatus::Failed
        });
        sink.record_interaction(
            InteractionDraft::new(
                format!("quiz_result_{}_{}", self.quiz.id, self.attempt_number),
                InteractionKind::Performance,
                format!("score_{score}"),
            )
            .with_correct([self.quiz.passing_score.to_string()])
            .with_result(InteractionResult::from_match(passed))
            .with_latency(elapsed),
        );

        let outcome = QuizOutcome {
            score,
            passed,
            elapsed,
        };
        self.phase = QuizPhase::Submitted(outcome);
        debug!(quiz = %self.quiz.id, score, passed, "quiz submitted");
        Ok(outcome)
    }

    #[must_use]
    pub fn can_retry(&self) -> bool {
        matches!(self.phase, QuizPhase::Submitted(o) if !o.passed)
            && self.attempt_number < self.quiz.max_attempts
    }

    /// Clear answers and start the next attempt.
    ///
    /// # Errors
    ///
    /// `RetryNotAllowed` after a pass, before submission, or when attempts
    /// are used up.
    pub fn retry(&mut self, sink: &mut dyn ProgressSink) -> Result<(), QuizError> {
        if !self.can_retry() {
            return Err(QuizError::RetryNotAllowed);
        }
        self.attempt_number += 1;
        self.answers.clear();
        self.current = 0;
        self.remaining_secs = self.quiz.time_limit_secs();
        self.begin(sink);
        Ok(())
    }

    /// Per-question breakdown, available once submitted.
    #[must_use]
    pub fn review(&self) -> Option<Vec<QuestionReview>> {
        if !matches!(self.phase, QuizPhase::Submitted(_)) {
            return None;
        }
        Some(
            self.quiz
                .questions
                .iter()
                .map(|q| {
                    let given = self.answers.get(&q.id).cloned().unwrap_or_default();
                    QuestionReview {
                        question_id: q.id.clone(),
                        correct: is_exact_match(self.answers.get(&q.id), q),
                        given,
                        correct_answers: q.correct_answers.clone(),
                        explanation: q.explanation.clone(),
                    }
                })
                .collect(),
        )
    }
}
