use std::sync::Arc;

use lms_core::model::{CourseId, UserId};
use storage::repository::Storage;

use crate::Clock;
use crate::course_service::CourseService;
use crate::dashboard::DashboardService;
use crate::error::{AppServicesError, LearnerSessionError};
use crate::h5p_service::H5pService;
use crate::learner_session::LearnerSession;
use crate::progress_service::ProgressService;
use crate::tracking_service::ScormTrackingService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    tracking: Arc<ScormTrackingService>,
    progress: Arc<ProgressService>,
    dashboard: Arc<DashboardService>,
    courses: Arc<CourseService>,
    h5p: Arc<H5pService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        Self {
            clock,
            tracking: Arc::new(ScormTrackingService::new(clock, Arc::clone(&storage.scorm))),
            progress: Arc::new(ProgressService::new(
                clock,
                Arc::clone(&storage.enrollments),
            )),
            dashboard: Arc::new(DashboardService::new(
                Arc::clone(&storage.courses),
                Arc::clone(&storage.enrollments),
                Arc::clone(&storage.scorm),
            )),
            courses: Arc::new(CourseService::new(
                clock,
                Arc::clone(&storage.courses),
                Arc::clone(&storage.users),
            )),
            h5p: Arc::new(H5pService::new(
                clock,
                Arc::clone(&storage.h5p),
                Arc::clone(&storage.users),
            )),
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn tracking(&self) -> Arc<ScormTrackingService> {
        Arc::clone(&self.tracking)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn courses(&self) -> Arc<CourseService> {
        Arc::clone(&self.courses)
    }

    #[must_use]
    pub fn h5p(&self) -> Arc<H5pService> {
        Arc::clone(&self.h5p)
    }

    /// Open a learner session, resuming the stored ledger when present.
    ///
    /// # Errors
    ///
    /// Returns `LearnerSessionError::Tracking` if the snapshot cannot be read.
    pub async fn learner_session(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<LearnerSession, LearnerSessionError> {
        LearnerSession::resume(
            user_id,
            course_id,
            self.clock,
            self.tracking.as_ref().clone(),
        )
        .await
    }
}
