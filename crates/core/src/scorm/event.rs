use chrono::Duration;

use crate::model::{InteractionEvent, LessonStatus, ModuleId, Objective, ProgressLedger, Score};

/// One change to a tracking session.
///
/// The session's event log is authoritative; the ledger is the fold of these
/// events over [`ProgressLedger::default`].
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// Progress reported for a module. `progress` is already clamped to [0, 100].
    ProgressUpdated { module_id: ModuleId, progress: f64 },
    StatusSet(LessonStatus),
    ScoreSet(Score),
    InteractionRecorded(InteractionEvent),
    /// Whole seconds since the session started, and the running total
    /// including time carried in from earlier sessions.
    SessionTimeUpdated { session: Duration, total: Duration },
    SuspendDataSet(String),
    ObjectiveSet(Objective),
    /// Wholesale replacement from an imported snapshot.
    Imported(Box<ProgressLedger>),
}

impl LedgerEvent {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProgressUpdated { .. } => "progress_updated",
            Self::StatusSet(_) => "status_set",
            Self::ScoreSet(_) => "score_set",
            Self::InteractionRecorded(_) => "interaction_recorded",
            Self::SessionTimeUpdated { .. } => "session_time_updated",
            Self::SuspendDataSet(_) => "suspend_data_set",
            Self::ObjectiveSet(_) => "objective_set",
            Self::Imported(_) => "imported",
        }
    }
}
