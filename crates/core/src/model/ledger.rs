use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::{InteractionEvent, ModuleId};
use crate::scorm::LedgerEvent;

/// SCORM `cmi.core.lesson_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LessonStatus {
    #[default]
    #[serde(rename = "not attempted", alias = "not-attempted")]
    NotAttempted,
    Incomplete,
    Completed,
    Passed,
    Failed,
    Browsed,
}

impl LessonStatus {
    /// Status implied by a progress percentage.
    ///
    /// `>= 100` is completed, anything above zero is incomplete, the rest is
    /// not attempted.
    #[must_use]
    pub fn from_progress(progress: f64) -> Self {
        if progress >= 100.0 {
            Self::Completed
        } else if progress > 0.0 {
            Self::Incomplete
        } else {
            Self::NotAttempted
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAttempted => "not attempted",
            Self::Incomplete => "incomplete",
            Self::Completed => "completed",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Browsed => "browsed",
        }
    }

    /// Parses the storage/wire spelling. Accepts `not-attempted` as well.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "not attempted" | "not-attempted" => Some(Self::NotAttempted),
            "incomplete" => Some(Self::Incomplete),
            "completed" => Some(Self::Completed),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "browsed" => Some(Self::Browsed),
            _ => None,
        }
    }

    /// Completed, passed, or failed.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Passed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub raw: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            raw: 0.0,
            min: 0.0,
            max: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveStatus {
    Passed,
    Failed,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub score: f64,
    pub status: ObjectiveStatus,
}

/// In-memory record of one learner's progress through one content module
/// session.
///
/// The ledger is a materialised view: it only changes through
/// [`ProgressLedger::apply`], which the tracking session drives from its
/// event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLedger {
    lesson_status: LessonStatus,
    #[serde(with = "crate::time::hms")]
    session_time: Duration,
    #[serde(with = "crate::time::hms")]
    total_time: Duration,
    score: Score,
    location: ModuleId,
    suspend_data: String,
    interactions: Vec<InteractionEvent>,
    objectives: Vec<Objective>,
}

impl Default for ProgressLedger {
    fn default() -> Self {
        Self {
            lesson_status: LessonStatus::NotAttempted,
            session_time: Duration::zero(),
            total_time: Duration::zero(),
            score: Score::default(),
            location: ModuleId::default(),
            suspend_data: String::new(),
            interactions: Vec::new(),
            objectives: Vec::new(),
        }
    }
}

impl ProgressLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger by folding events over the defaults.
    #[must_use]
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a LedgerEvent>) -> Self {
        let mut ledger = Self::default();
        for event in events {
            ledger.apply(event);
        }
        ledger
    }

    /// Apply one event to the view. Events are assumed already validated.
    pub fn apply(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::ProgressUpdated {
                module_id,
                progress,
            } => {
                self.location = module_id.clone();
                self.lesson_status = LessonStatus::from_progress(*progress);
            }
            LedgerEvent::StatusSet(status) => self.lesson_status = *status,
            LedgerEvent::ScoreSet(score) => self.score = *score,
            LedgerEvent::InteractionRecorded(interaction) => {
                self.interactions.push(interaction.clone());
            }
            LedgerEvent::SessionTimeUpdated { session, total } => {
                self.session_time = *session;
                self.total_time = *total;
            }
            LedgerEvent::SuspendDataSet(data) => self.suspend_data.clone_from(data),
            LedgerEvent::ObjectiveSet(objective) => {
                match self.objectives.iter_mut().find(|o| o.id == objective.id) {
                    Some(existing) => *existing = objective.clone(),
                    None => self.objectives.push(objective.clone()),
                }
            }
            LedgerEvent::Imported(ledger) => *self = (**ledger).clone(),
        }
    }

    // Accessors
    #[must_use]
    pub fn lesson_status(&self) -> LessonStatus {
        self.lesson_status
    }

    #[must_use]
    pub fn session_time(&self) -> Duration {
        self.session_time
    }

    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn location(&self) -> &ModuleId {
        &self.location
    }

    #[must_use]
    pub fn suspend_data(&self) -> &str {
        &self.suspend_data
    }

    #[must_use]
    pub fn interactions(&self) -> &[InteractionEvent] {
        &self.interactions
    }

    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Timestamp of the newest interaction, if any.
    #[must_use]
    pub fn last_interaction_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.interactions.last().map(|i| i.timestamp)
    }
}

/// Field-by-field form of a ledger, used by persistence adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerParts {
    pub lesson_status: LessonStatus,
    pub session_time: Duration,
    pub total_time: Duration,
    pub score: Score,
    pub location: ModuleId,
    pub suspend_data: String,
    pub interactions: Vec<InteractionEvent>,
    pub objectives: Vec<Objective>,
}

impl From<LedgerParts> for ProgressLedger {
    fn from(parts: LedgerParts) -> Self {
        Self {
            lesson_status: parts.lesson_status,
            session_time: parts.session_time,
            total_time: parts.total_time,
            score: parts.score,
            location: parts.location,
            suspend_data: parts.suspend_data,
            interactions: parts.interactions,
            objectives: parts.objectives,
        }
    }
}

impl From<&ProgressLedger> for LedgerParts {
    fn from(ledger: &ProgressLedger) -> Self {
        Self {
            lesson_status: ledger.lesson_status,
            session_time: ledger.session_time,
            total_time: ledger.total_time,
            score: ledger.score,
            location: ledger.location.clone(),
            suspend_data: ledger.suspend_data.clone(),
            interactions: ledger.interactions.clone(),
            objectives: ledger.objectives.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_progress_thresholds() {
        assert_eq!(LessonStatus::from_progress(100.0), LessonStatus::Completed);
        assert_eq!(LessonStatus::from_progress(99.9), LessonStatus::Incomplete);
        assert_eq!(LessonStatus::from_progress(0.01), LessonStatus::Incomplete);
        assert_eq!(LessonStatus::from_progress(0.0), LessonStatus::NotAttempted);
    }

    #[test]
    fn status_wire_spelling() {
        let json = serde_json::to_string(&LessonStatus::NotAttempted).unwrap();
        assert_eq!(json, "\"not attempted\"");
        let parsed: LessonStatus = serde_json::from_str("\"not-attempted\"").unwrap();
        assert_eq!(parsed, LessonStatus::NotAttempted);
        assert_eq!(LessonStatus::parse("passed"), Some(LessonStatus::Passed));
        assert_eq!(LessonStatus::parse("done"), None);
    }

    #[test]
    fn defaults_match_session_start() {
        let ledger = ProgressLedger::new();
        assert_eq!(ledger.lesson_status(), LessonStatus::NotAttempted);
        assert_eq!(ledger.score(), Score::default());
        assert!(ledger.interactions().is_empty());

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["sessionTime"], "00:00:00");
        assert_eq!(json["lessonStatus"], "not attempted");
        assert_eq!(json["score"]["max"], 100.0);
    }

    #[test]
    fn objectives_upsert_by_id() {
        let mut ledger = ProgressLedger::new();
        let first = Objective {
            id: "obj-1".into(),
            score: 40.0,
            status: ObjectiveStatus::Unknown,
        };
        let second = Objective {
            score: 90.0,
            status: ObjectiveStatus::Passed,
            ..first.clone()
        };
        ledger.apply(&LedgerEvent::ObjectiveSet(first));
        ledger.apply(&LedgerEvent::ObjectiveSet(second.clone()));
        assert_eq!(ledger.objectives(), &[second]);
    }

    #[test]
    fn session_time_update_sets_both_clocks() {
        let mut ledger = ProgressLedger::new();
        ledger.apply(&LedgerEvent::SessionTimeUpdated {
            session: Duration::seconds(10),
            total: Duration::seconds(100),
        });
        ledger.apply(&LedgerEvent::SessionTimeUpdated {
            session: Duration::seconds(25),
            total: Duration::seconds(115),
        });
        assert_eq!(ledger.session_time(), Duration::seconds(25));
        assert_eq!(ledger.total_time(), Duration::seconds(115));
    }

    #[test]
    fn parts_round_trip() {
        let mut ledger = ProgressLedger::new();
        ledger.apply(&LedgerEvent::SuspendDataSet("page=2".into()));
        ledger.apply(&LedgerEvent::StatusSet(LessonStatus::Browsed));
        let parts = LedgerParts::from(&ledger);
        assert_eq!(parts.suspend_data, "page=2");
        assert_eq!(ProgressLedger::from(parts), ledger);
    }
}
