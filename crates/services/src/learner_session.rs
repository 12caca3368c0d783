//! One learner's live tracking session: the event-sourced ledger, the toast
//! list fed by its status changes, and persistence of snapshots.

use std::sync::{Arc, Mutex};

use lms_core::model::{CourseId, LessonStatus, Score, UserId};
use lms_core::notify::{Notifier, Toast, ToastId, ToastVariant};
use lms_core::scorm::{LedgerEvent, ProgressSink, ScormSession};
use storage::repository::ScormRecord;
use tracing::{error, info};

use crate::Clock;
use crate::error::LearnerSessionError;
use crate::tracking_service::ScormTrackingService;

type StatusInbox = Arc<Mutex<Vec<(LessonStatus, Score)>>>;

pub struct LearnerSession {
    user_id: UserId,
    course_id: CourseId,
    session: ScormSession,
    notifier: Notifier,
    inbox: StatusInbox,
    tracking: ScormTrackingService,
}

impl std::fmt::Debug for LearnerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearnerSession")
            .field("user_id", &self.user_id)
            .field("course_id", &self.course_id)
            .field("session", &self.session)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl LearnerSession {
    /// Fresh session with an empty ledger.
    #[must_use]
    pub fn start(
        user_id: UserId,
        course_id: CourseId,
        clock: Clock,
        tracking: ScormTrackingService,
    ) -> Self {
        Self::wire(user_id, course_id, ScormSession::new(clock), tracking)
    }

    /// Continue from the stored snapshot, or start fresh if there is none.
    ///
    /// # Errors
    ///
    /// Returns `LearnerSessionError::Tracking` if the snapshot cannot be read.
    pub async fn resume(
        user_id: UserId,
        course_id: CourseId,
        clock: Clock,
        tracking: ScormTrackingService,
    ) -> Result<Self, LearnerSessionError> {
        let session = match tracking.restore(user_id, course_id).await? {
            Some(ledger) => {
                info!(%user_id, %course_id, status = ledger.lesson_status().as_str(), "resumed ledger");
                ScormSession::resume(clock, ledger)
            }
            None => ScormSession::new(clock),
        };
        Ok(Self::wire(user_id, course_id, session, tracking))
    }

    fn wire(
        user_id: UserId,
        course_id: CourseId,
        mut session: ScormSession,
        tracking: ScormTrackingService,
    ) -> Self {
        let inbox = StatusInbox::default();
        let sink = Arc::clone(&inbox);
        let mut last = session.ledger().lesson_status();
        session.subscribe(move |event, ledger| {
            let status = ledger.lesson_status();
            if status == last {
                return;
            }
            last = status;
            if matches!(event, LedgerEvent::Imported(_)) {
                return;
            }
            if !matches!(
                status,
                LessonStatus::Completed | LessonStatus::Passed | LessonStatus::Failed
            ) {
                return;
            }
            if let Ok(mut pending) = sink.lock() {
                pending.push((status, ledger.score()));
            }
        });
        Self {
            user_id,
            course_id,
            session,
            notifier: Notifier::new(),
            inbox,
            tracking,
        }
    }

    #[must_use]
    pub fn session(&self) -> &ScormSession {
        &self.session
    }

    /// Direct ledger access. Status toasts raised meanwhile surface on the
    /// next call to [`LearnerSession::toasts`].
    pub fn session_mut(&mut self) -> &mut ScormSession {
        &mut self.session
    }

    /// Run a tracker or quiz step against the session.
    ///
    /// # Errors
    ///
    /// Returns `LearnerSessionError::Core` wrapping the step's own error.
    pub fn drive<T, E>(
        &mut self,
        step: impl FnOnce(&mut ScormSession) -> Result<T, E>,
    ) -> Result<T, LearnerSessionError>
    where
        E: Into<lms_core::Error>,
    {
        let out = step(&mut self.session).map_err(|e| LearnerSessionError::Core(e.into()));
        self.flush_status_toasts();
        out
    }

    pub fn toasts(&mut self) -> &[Toast] {
        self.flush_status_toasts();
        self.notifier.toasts()
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn dismiss(&mut self, id: ToastId) -> bool {
        self.notifier.dismiss(id)
    }

    /// Drop toasts past their lifetime, measured on the session clock.
    pub fn expire_toasts(&mut self) -> usize {
        let now = self.session.now();
        self.notifier.expire(now)
    }

    /// Replace the ledger with an exported snapshot.
    ///
    /// # Errors
    ///
    /// Returns `LearnerSessionError::Ledger` for malformed input; a
    /// destructive toast is raised as well.
    pub fn import_json(&mut self, raw: &str) -> Result<(), LearnerSessionError> {
        if let Err(err) = self.session.import_json(raw) {
            let now = self.session.now();
            self.notifier.push(
                "Import failed",
                Some(err.to_string()),
                ToastVariant::Destructive,
                now,
            );
            return Err(err.into());
        }
        Ok(())
    }

    /// Refresh session time and store the current ledger.
    ///
    /// # Errors
    ///
    /// Returns `LearnerSessionError::Tracking` when the snapshot is rejected
    /// or storage fails; a destructive toast is raised as well.
    pub async fn persist(&mut self) -> Result<ScormRecord, LearnerSessionError> {
        self.session.tick();
        self.flush_status_toasts();
        match self
            .tracking
            .save_snapshot(self.user_id, self.course_id, self.session.ledger())
            .await
        {
            Ok(record) => Ok(record),
            Err(err) => {
                error!(
                    user_id = %self.user_id,
                    course_id = %self.course_id,
                    error = %err,
                    "failed to persist ledger"
                );
                let now = self.session.now();
                self.notifier.push(
                    "Failed to save progress",
                    Some(err.to_string()),
                    ToastVariant::Destructive,
                    now,
                );
                Err(err.into())
            }
        }
    }

    fn flush_status_toasts(&mut self) {
        let pending = match self.inbox.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        let now = self.session.now();
        for (status, score) in pending {
            let (title, description, variant) = match status {
                LessonStatus::Completed => ("Module completed", None, ToastVariant::Default),
                LessonStatus::Passed => (
                    "Assessment passed",
                    Some(format!("Score: {}", score.raw)),
                    ToastVariant::Default,
                ),
                _ => (
                    "Assessment failed",
                    Some(format!("Score: {}", score.raw)),
                    ToastVariant::Destructive,
                ),
            };
            self.notifier.push(title, description, variant, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use chrono::Duration;
    use lms_core::model::ModuleId;
    use lms_core::quiz::{QuestionKind, QuizAttempt, QuizModule, QuizQuestion};
    use lms_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn quiz() -> QuizModule {
        let q = |id: &str, answer: &str| QuizQuestion {
            id: id.into(),
            kind: QuestionKind::TrueFalse,
            question: format!("Question {id}"),
            options: vec!["true".into(), "false".into()],
            correct_answers: BTreeSet::from([answer.to_owned()]),
            explanation: String::new(),
            points: 50,
        };
        QuizModule {
            id: ModuleId::new("quiz-1"),
            title: "Checkpoint".into(),
            description: String::new(),
            questions: vec![q("a", "true"), q("b", "false")],
            time_limit: None,
            passing_score: 70,
            max_attempts: 2,
        }
    }

    fn tracking() -> ScormTrackingService {
        ScormTrackingService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryRepository::new()),
        )
    }

    #[test]
    fn passing_a_quiz_raises_completion_and_pass_toasts() {
        let mut learner = LearnerSession::start(
            UserId::new(1),
            CourseId::new(1),
            Clock::fixed(fixed_now()),
            tracking(),
        );
        let mut attempt = QuizAttempt::new(quiz()).unwrap();
        learner.drive(|s| attempt.start(s)).unwrap();
        learner.drive(|s| attempt.answer("a", ["true"], s)).unwrap();
        learner.drive(|s| attempt.answer("b", ["false"], s)).unwrap();
        let outcome = learner.drive(|s| attempt.submit(s)).unwrap();
        assert!(outcome.passed);

        let titles: Vec<&str> = learner.toasts().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Module completed", "Assessment passed"]);
        assert_eq!(
            learner.toasts()[1].description.as_deref(),
            Some("Score: 100")
        );
    }

    #[test]
    fn failing_raises_destructive_toast_and_errors_are_wrapped() {
        let mut learner = LearnerSession::start(
            UserId::new(1),
            CourseId::new(1),
            Clock::fixed(fixed_now()),
            tracking(),
        );
        let mut attempt = QuizAttempt::new(quiz()).unwrap();
        assert!(matches!(
            learner.drive(|s| attempt.answer("a", ["true"], s)),
            Err(LearnerSessionError::Core(lms_core::Error::Quiz(_)))
        ));
        learner.drive(|s| attempt.start(s)).unwrap();
        learner.drive(|s| attempt.submit(s)).unwrap();

        let last = learner.toasts().last().cloned().unwrap();
        assert_eq!(last.title, "Assessment failed");
        assert_eq!(last.variant, ToastVariant::Destructive);
    }

    #[test]
    fn toasts_expire_on_the_session_clock() {
        let mut learner = LearnerSession::start(
            UserId::new(1),
            CourseId::new(1),
            Clock::fixed(fixed_now()),
            tracking(),
        );
        assert!(learner.import_json("{not json").is_err());
        assert_eq!(learner.toasts().len(), 1);
        learner
            .session_mut()
            .clock_mut()
            .advance(Duration::seconds(5));
        assert_eq!(learner.expire_toasts(), 1);
        assert!(learner.toasts().is_empty());
    }

    #[tokio::test]
    async fn persist_then_resume_keeps_ledger_without_toasts() {
        let tracking = tracking();
        let mut learner = LearnerSession::start(
            UserId::new(4),
            CourseId::new(2),
            Clock::fixed(fixed_now()),
            tracking.clone(),
        );
        learner
            .drive(|s| s.update_progress(&ModuleId::new("m-1"), 100.0))
            .unwrap();
        learner
            .session_mut()
            .clock_mut()
            .advance(Duration::seconds(90));
        let record = learner.persist().await.unwrap();
        assert_eq!(record.session_time, Duration::seconds(90));

        let mut resumed = LearnerSession::resume(
            UserId::new(4),
            CourseId::new(2),
            Clock::fixed(fixed_now()),
            tracking,
        )
        .await
        .unwrap();
        assert_eq!(resumed.session().ledger(), learner.session().ledger());
        assert!(resumed.toasts().is_empty());
    }

    #[tokio::test]
    async fn total_time_accumulates_across_resumed_sessions() {
        let tracking = tracking();
        let mut learner = LearnerSession::start(
            UserId::new(6),
            CourseId::new(3),
            Clock::fixed(fixed_now()),
            tracking.clone(),
        );
        learner
            .session_mut()
            .clock_mut()
            .advance(Duration::seconds(90));
        learner.persist().await.unwrap();

        let mut later = Clock::fixed(fixed_now());
        later.advance(Duration::days(1));
        let mut resumed = LearnerSession::resume(UserId::new(6), CourseId::new(3), later, tracking)
            .await
            .unwrap();
        resumed
            .session_mut()
            .clock_mut()
            .advance(Duration::seconds(10));
        let record = resumed.persist().await.unwrap();
        assert_eq!(record.session_time, Duration::seconds(10));
        assert_eq!(record.total_time, Duration::seconds(100));
    }
}
