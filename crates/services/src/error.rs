//! Shared error types for the services crate.

use thiserror::Error;

use lms_core::builder::BuilderError;
use lms_core::model::UserId;
use lms_core::scorm::LedgerError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ScormTrackingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackingError {
    #[error("score must be finite with min <= max")]
    InvalidScore,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress must be between 0 and 100, got {0}")]
    OutOfRange(f64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseServiceError {
    #[error("course title cannot be empty")]
    EmptyTitle,
    #[error("course not found")]
    NotFound,
    #[error("author {0} does not exist")]
    UnknownAuthor(UserId),
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `H5pService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum H5pServiceError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("author {0} does not exist")]
    UnknownAuthor(UserId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LearnerSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LearnerSessionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Core(#[from] lms_core::Error),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
