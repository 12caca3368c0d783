use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
    InteractionDraft, InteractionEvent, LessonStatus, ModuleId, Objective, ObjectiveStatus,
    ProgressLedger, Score,
};
use crate::scorm::LedgerEvent;
use crate::time::Clock;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("progress must be a finite number, got {0}")]
    InvalidProgress(f64),

    #[error("invalid score: raw={raw}, min={min}, max={max}")]
    InvalidScore { raw: f64, min: f64, max: f64 },

    #[error("objective score must be a finite number, got {0}")]
    InvalidObjectiveScore(f64),

    #[error("malformed ledger JSON: {0}")]
    MalformedImport(String),

    #[error("failed to serialize ledger: {0}")]
    Serialize(String),
}

//
// ─── SINK ──────────────────────────────────────────────────────────────────────
//

/// Where progress aggregators push their samples.
pub trait ProgressSink {
    /// Report module progress; returns the lesson status it implied.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidProgress` for non-finite input.
    fn update_progress(
        &mut self,
        module_id: &ModuleId,
        progress: f64,
    ) -> Result<LessonStatus, LedgerError>;

    /// Stamp and append an interaction; returns the stored event.
    fn record_interaction(&mut self, draft: InteractionDraft) -> InteractionEvent;

    fn set_lesson_status(&mut self, status: LessonStatus);

    /// # Errors
    ///
    /// Returns `LedgerError::InvalidScore` for non-finite values or `min > max`.
    fn set_score(&mut self, raw: f64, min: f64, max: f64) -> Result<(), LedgerError>;

    fn now(&self) -> DateTime<Utc>;
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Handle returned by [`ScormSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&LedgerEvent, &ProgressLedger) + Send>;

/// One learner's tracking session: the authoritative event log, the ledger
/// view derived from it, and the observers notified on every change.
pub struct ScormSession {
    clock: Clock,
    started_at: DateTime<Utc>,
    carried_total: Duration,
    ledger: ProgressLedger,
    events: Vec<LedgerEvent>,
    last_stamp: Option<DateTime<Utc>>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl std::fmt::Debug for ScormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScormSession")
            .field("started_at", &self.started_at)
            .field("carried_total", &self.carried_total)
            .field("ledger", &self.ledger)
            .field("events", &self.events.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl ScormSession {
    /// Start a session with a default ledger.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            started_at: clock.now(),
            carried_total: Duration::zero(),
            ledger: ProgressLedger::default(),
            events: Vec::new(),
            last_stamp: None,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Start a session resuming a previously persisted ledger.
    ///
    /// The saved `totalTime` is carried forward; `sessionTime` restarts
    /// from this session's first tick.
    #[must_use]
    pub fn resume(clock: Clock, ledger: ProgressLedger) -> Self {
        let mut session = Self::new(clock);
        session.adopt(ledger);
        session
    }

    #[must_use]
    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    #[must_use]
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Rebuild the ledger from the event log.
    ///
    /// Always equal to [`ScormSession::ledger`].
    #[must_use]
    pub fn replay(&self) -> ProgressLedger {
        ProgressLedger::replay(&self.events)
    }

    /// Mutable access to the session clock, for deterministic sessions.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Register an observer called after every applied event.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&LedgerEvent, &ProgressLedger) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn apply(&mut self, event: LedgerEvent) {
        debug!(event = event.name(), "ledger event");
        self.ledger.apply(&event);
        for (_, observer) in &mut self.observers {
            observer(&event, &self.ledger);
        }
        self.events.push(event);
    }

    fn adopt(&mut self, ledger: ProgressLedger) {
        self.last_stamp = ledger.last_interaction_at();
        self.carried_total = ledger.total_time();
        self.started_at = self.clock.now();
        self.apply(LedgerEvent::Imported(Box::new(ledger)));
    }

    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = self.clock.now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    /// Recompute `sessionTime` from the session start and `totalTime` from
    /// the carried total.
    pub fn tick(&mut self) {
        let elapsed = self.clock.now().signed_duration_since(self.started_at);
        let session = Duration::seconds(elapsed.num_seconds().max(0));
        let total = self.carried_total + session;
        if session != self.ledger.session_time() || total != self.ledger.total_time() {
            self.apply(LedgerEvent::SessionTimeUpdated { session, total });
        }
    }

    pub fn set_suspend_data(&mut self, data: impl Into<String>) {
        self.apply(LedgerEvent::SuspendDataSet(data.into()));
    }

    /// Insert or replace an objective by id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidObjectiveScore` for a non-finite score.
    pub fn set_objective(
        &mut self,
        id: impl Into<String>,
        score: f64,
        status: ObjectiveStatus,
    ) -> Result<(), LedgerError> {
        if !score.is_finite() {
            return Err(LedgerError::InvalidObjectiveScore(score));
        }
        self.apply(LedgerEvent::ObjectiveSet(Objective {
            id: id.into(),
            score,
            status,
        }));
        Ok(())
    }

    /// Serialize the whole ledger as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Serialize` if serialization fails.
    pub fn export_json(&self) -> Result<String, LedgerError> {
        serde_json::to_string_pretty(&self.ledger).map_err(|e| LedgerError::Serialize(e.to_string()))
    }

    /// Replace the ledger with a previously exported snapshot.
    ///
    /// Malformed input is logged and leaves the ledger untouched.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::MalformedImport` when the JSON does not parse.
    pub fn import_json(&mut self, raw: &str) -> Result<(), LedgerError> {
        match serde_json::from_str::<ProgressLedger>(raw) {
            Ok(imported) => {
                self.adopt(imported);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "ignoring malformed SCORM import");
                Err(LedgerError::MalformedImport(err.to_string()))
            }
        }
    }
}

impl ProgressSink for ScormSession {
    fn update_progress(
        &mut self,
        module_id: &ModuleId,
        progress: f64,
    ) -> Result<LessonStatus, LedgerError> {
        if !progress.is_finite() {
            return Err(LedgerError::InvalidProgress(progress));
        }
        self.apply(LedgerEvent::ProgressUpdated {
            module_id: module_id.clone(),
            progress: progress.clamp(0.0, 100.0),
        });
        Ok(self.ledger.lesson_status())
    }

    fn record_interaction(&mut self, draft: InteractionDraft) -> InteractionEvent {
        let stamp = self.next_stamp();
        let mut event = draft.stamp(stamp);
        event.latency = Duration::seconds(event.latency.num_seconds().max(0));
        if !event.weighting.is_finite() {
            warn!(interaction = %event.id, "non-finite weighting reset to 0");
            event.weighting = 0.0;
        }
        self.apply(LedgerEvent::InteractionRecorded(event.clone()));
        event
    }

    fn set_lesson_status(&mut self, status: LessonStatus) {
        self.apply(LedgerEvent::StatusSet(status));
    }

    fn set_score(&mut self, raw: f64, min: f64, max: f64) -> Result<(), LedgerError> {
        if !(raw.is_finite() && min.is_finite() && max.is_finite()) || min > max {
            return Err(LedgerError::InvalidScore { raw, min, max });
        }
        self.apply(LedgerEvent::ScoreSet(Score {
            raw: raw.clamp(min, max),
            min,
            max,
        }));
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InteractionKind, InteractionResult};
    use crate::time::{fixed_clock, fixed_now};
    use std::sync::{Arc, Mutex};

    fn module() -> ModuleId {
        ModuleId::new("module-1")
    }

    #[test]
    fn update_progress_sets_location_and_status() {
        let mut session = ScormSession::new(fixed_clock());
        for (progress, expected) in [
            (0.0, LessonStatus::NotAttempted),
            (-5.0, LessonStatus::NotAttempted),
            (0.5, LessonStatus::Incomplete),
            (99.99, LessonStatus::Incomplete),
            (100.0, LessonStatus::Completed),
            (250.0, LessonStatus::Completed),
        ] {
            let status = session.update_progress(&module(), progress).unwrap();
            assert_eq!(status, expected, "progress {progress}");
            assert_eq!(session.ledger().lesson_status(), expected);
        }
        assert_eq!(session.ledger().location(), &module());
    }

    #[test]
    fn non_finite_progress_is_rejected_without_change() {
        let mut session = ScormSession::new(fixed_clock());
        let err = session.update_progress(&module(), f64::NAN).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidProgress(_)));
        assert!(session.events().is_empty());
    }

    #[test]
    fn interactions_append_in_order_with_increasing_stamps() {
        let mut session = ScormSession::new(fixed_clock());
        for i in 0..5 {
            session.record_interaction(InteractionDraft::new(
                format!("i{i}"),
                InteractionKind::Choice,
                "a",
            ));
        }

        let interactions = session.ledger().interactions();
        assert_eq!(interactions.len(), 5);
        for (i, event) in interactions.iter().enumerate() {
            assert_eq!(event.id, format!("i{i}"));
        }
        for pair in interactions.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        assert_eq!(interactions[0].timestamp, fixed_now());
    }

    #[test]
    fn set_score_defaults_and_validation() {
        let mut session = ScormSession::new(fixed_clock());
        session.set_score(80.0, 0.0, 100.0).unwrap();
        assert_eq!(
            session.ledger().score(),
            Score {
                raw: 80.0,
                min: 0.0,
                max: 100.0
            }
        );

        assert!(session.set_score(10.0, 50.0, 20.0).is_err());
        assert!(session.set_score(f64::INFINITY, 0.0, 100.0).is_err());
        assert!((session.ledger().score().raw - 80.0).abs() < f64::EPSILON);

        session.set_score(140.0, 0.0, 100.0).unwrap();
        assert!((session.ledger().score().raw - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn status_setter_is_last_write_wins() {
        let mut session = ScormSession::new(fixed_clock());
        session.set_lesson_status(LessonStatus::Passed);
        session.set_lesson_status(LessonStatus::Browsed);
        assert_eq!(session.ledger().lesson_status(), LessonStatus::Browsed);
    }

    #[test]
    fn export_then_import_reproduces_ledger() {
        let mut clock = fixed_clock();
        let mut session = ScormSession::new(clock);
        session.update_progress(&module(), 40.0).unwrap();
        session.record_interaction(
            InteractionDraft::new("q1", InteractionKind::Choice, "b")
                .with_correct(["b"])
                .with_result(InteractionResult::Correct),
        );
        session.set_score(72.5, 0.0, 100.0).unwrap();
        session
            .set_objective("obj", 72.5, ObjectiveStatus::Passed)
            .unwrap();
        session.set_suspend_data("{\"page\":3}");
        clock.advance(Duration::seconds(75));
        *session.clock_mut() = clock;
        session.tick();

        let exported = session.export_json().unwrap();
        let mut other = ScormSession::new(fixed_clock());
        other.import_json(&exported).unwrap();
        assert_eq!(other.ledger(), session.ledger());
        assert_eq!(other.ledger().session_time(), Duration::seconds(75));
    }

    #[test]
    fn malformed_import_leaves_ledger_unchanged() {
        let mut session = ScormSession::new(fixed_clock());
        session.update_progress(&module(), 10.0).unwrap();
        let before = session.ledger().clone();
        let events_before = session.events().len();

        let err = session.import_json("{not json").unwrap_err();
        assert!(matches!(err, LedgerError::MalformedImport(_)));
        assert_eq!(session.ledger(), &before);
        assert_eq!(session.events().len(), events_before);
    }

    #[test]
    fn replay_matches_view() {
        let mut session = ScormSession::new(fixed_clock());
        session.update_progress(&module(), 30.0).unwrap();
        session.record_interaction(InteractionDraft::new("a", InteractionKind::Numeric, "3"));
        session.set_lesson_status(LessonStatus::Failed);
        session
            .import_json(&serde_json::to_string(&ProgressLedger::default()).unwrap())
            .unwrap();
        session.update_progress(&module(), 100.0).unwrap();

        assert_eq!(&session.replay(), session.ledger());
    }

    #[test]
    fn observers_see_every_event_until_unsubscribed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = ScormSession::new(fixed_clock());
        let sink = Arc::clone(&seen);
        let id = session.subscribe(move |event, ledger| {
            sink.lock()
                .unwrap()
                .push((event.name(), ledger.lesson_status()));
        });

        session.update_progress(&module(), 100.0).unwrap();
        session.set_lesson_status(LessonStatus::Passed);
        assert!(session.unsubscribe(id));
        assert!(!session.unsubscribe(id));
        session.set_lesson_status(LessonStatus::Failed);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("progress_updated", LessonStatus::Completed),
                ("status_set", LessonStatus::Passed),
            ]
        );
    }

    #[test]
    fn non_finite_objective_score_is_rejected() {
        let mut session = ScormSession::new(fixed_clock());
        for bad in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                session.set_objective("obj", bad, ObjectiveStatus::Unknown),
                Err(LedgerError::InvalidObjectiveScore(_))
            ));
        }
        assert!(session.ledger().objectives().is_empty());
        assert!(session.events().is_empty());

        let exported = session.export_json().unwrap();
        let mut other = ScormSession::new(fixed_clock());
        other.import_json(&exported).unwrap();
        assert_eq!(other.ledger(), session.ledger());
    }

    #[test]
    fn non_finite_weighting_is_stored_as_zero() {
        let mut session = ScormSession::new(fixed_clock());
        let event = session.record_interaction(
            InteractionDraft::new("q1", InteractionKind::Numeric, "4").with_weighting(f64::NAN),
        );
        assert!(event.weighting.abs() < f64::EPSILON);

        let exported = session.export_json().unwrap();
        let mut other = ScormSession::new(fixed_clock());
        other.import_json(&exported).unwrap();
        assert_eq!(other.ledger(), session.ledger());
    }

    #[test]
    fn resumed_session_adds_to_saved_total() {
        let mut first = ScormSession::new(fixed_clock());
        first.clock_mut().advance(Duration::seconds(90));
        first.tick();
        assert_eq!(first.ledger().total_time(), Duration::seconds(90));

        let mut clock = fixed_clock();
        clock.advance(Duration::hours(1));
        let mut resumed = ScormSession::resume(clock, first.ledger().clone());
        assert_eq!(resumed.ledger(), first.ledger());

        resumed.clock_mut().advance(Duration::seconds(10));
        resumed.tick();
        assert_eq!(resumed.ledger().session_time(), Duration::seconds(10));
        assert_eq!(resumed.ledger().total_time(), Duration::seconds(100));
        assert_eq!(&resumed.replay(), resumed.ledger());
    }

    #[test]
    fn tick_tracks_elapsed_session_time() {
        let mut session = ScormSession::new(fixed_clock());
        session.clock_mut().advance(Duration::seconds(3_725));
        session.tick();
        assert_eq!(session.ledger().session_time(), Duration::seconds(3_725));

        let json = serde_json::to_value(session.ledger()).unwrap();
        assert_eq!(json["sessionTime"], "01:02:05");
    }
}
