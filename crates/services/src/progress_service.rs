use std::sync::Arc;

use lms_core::model::{CourseId, UserId};
use storage::repository::{CourseProgressRecord, EnrollmentRecord, EnrollmentRepository};
use tracing::{info, warn};

use crate::Clock;
use crate::error::ProgressError;

/// Enrollment progress per learner and course.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, enrollments: Arc<dyn EnrollmentRepository>) -> Self {
        Self { clock, enrollments }
    }

    /// Create or update the enrollment. Reaching 100 stamps `completed_at`;
    /// anything lower clears it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::OutOfRange` unless `0 <= progress <= 100`.
    /// Returns `ProgressError::Storage` if persistence fails.
    pub async fn record_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        progress: f64,
    ) -> Result<EnrollmentRecord, ProgressError> {
        if !(0.0..=100.0).contains(&progress) {
            warn!(%user_id, %course_id, progress, "rejected enrollment progress");
            return Err(ProgressError::OutOfRange(progress));
        }
        let record = self
            .enrollments
            .upsert_enrollment(user_id, course_id, progress, self.clock.now())
            .await?;
        info!(
            %user_id,
            %course_id,
            progress = record.progress,
            completed = record.completed_at.is_some(),
            "recorded enrollment progress"
        );
        Ok(record)
    }

    /// Enrollments of one learner joined with course details, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if repository access fails.
    pub async fn course_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgressRecord>, ProgressError> {
        Ok(self.enrollments.progress_for_user(user_id).await?)
    }
}
