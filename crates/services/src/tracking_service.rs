use std::sync::Arc;

use lms_core::model::{CourseId, LedgerParts, ModuleId, ProgressLedger, UserId};
use storage::repository::{ScormRecord, ScormRepository, ScormSnapshot};
use tracing::info;

use crate::Clock;
use crate::error::TrackingError;

/// Rows returned by the SCORM listing endpoint.
pub const RECENT_SCORM_LIMIT: u32 = 50;

/// Persists ledger snapshots, one row per learner and course.
#[derive(Clone)]
pub struct ScormTrackingService {
    clock: Clock,
    scorm: Arc<dyn ScormRepository>,
}

impl ScormTrackingService {
    #[must_use]
    pub fn new(clock: Clock, scorm: Arc<dyn ScormRepository>) -> Self {
        Self { clock, scorm }
    }

    /// Snapshot a live ledger for `(user_id, course_id)`.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if persistence fails.
    pub async fn save_snapshot(
        &self,
        user_id: UserId,
        course_id: CourseId,
        ledger: &ProgressLedger,
    ) -> Result<ScormRecord, TrackingError> {
        self.save(snapshot_from_ledger(user_id, course_id, ledger))
            .await
    }

    /// Insert or replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::InvalidScore` for a non-finite score or
    /// `min > max`, and `TrackingError::Storage` if persistence fails.
    pub async fn save(&self, snapshot: ScormSnapshot) -> Result<ScormRecord, TrackingError> {
        let score = snapshot.score;
        if !(score.raw.is_finite() && score.min.is_finite() && score.max.is_finite())
            || score.min > score.max
        {
            return Err(TrackingError::InvalidScore);
        }
        let record = self.scorm.upsert_scorm(&snapshot, self.clock.now()).await?;
        info!(
            user_id = %record.user_id,
            course_id = %record.course_id,
            status = record.lesson_status.as_str(),
            interactions = record.interactions.len(),
            "saved SCORM snapshot"
        );
        Ok(record)
    }

    /// Latest rows by update time, newest first.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if repository access fails.
    pub async fn recent(&self, limit: u32) -> Result<Vec<ScormRecord>, TrackingError> {
        Ok(self.scorm.recent_scorm(limit).await?)
    }

    /// Rebuild the stored ledger for `(user_id, course_id)`.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if repository access fails.
    pub async fn restore(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<ProgressLedger>, TrackingError> {
        let record = self.scorm.get_scorm(user_id, course_id).await?;
        Ok(record.as_ref().map(ledger_from_record))
    }
}

#[must_use]
pub fn snapshot_from_ledger(
    user_id: UserId,
    course_id: CourseId,
    ledger: &ProgressLedger,
) -> ScormSnapshot {
    let parts = LedgerParts::from(ledger);
    ScormSnapshot {
        user_id,
        course_id,
        lesson_status: parts.lesson_status,
        score: parts.score,
        session_time: parts.session_time,
        total_time: parts.total_time,
        location: parts.location.as_str().to_owned(),
        suspend_data: parts.suspend_data,
        interactions: parts.interactions,
        objectives: parts.objectives,
    }
}

#[must_use]
pub fn ledger_from_record(record: &ScormRecord) -> ProgressLedger {
    ProgressLedger::from(LedgerParts {
        lesson_status: record.lesson_status,
        session_time: record.session_time,
        total_time: record.total_time,
        score: record.score,
        location: ModuleId::new(record.location.clone()),
        suspend_data: record.suspend_data.clone(),
        interactions: record.interactions.clone(),
        objectives: record.objectives.clone(),
    })
}
