//! Medium-specific progress aggregators.
//!
//! Each tracker turns its own signal (playback position, reading time, page
//! or scroll position) into a 0-100 progress value and pushes it, together
//! with interaction records, into a [`ProgressSink`](crate::scorm::ProgressSink).

mod document;
mod video;

use thiserror::Error;

use crate::scorm::LedgerError;

pub use document::{DocumentModule, DocumentTracker, DOCUMENT_COMPLETION_THRESHOLD};
pub use video::{VideoTracker, VIDEO_COMPLETION_THRESHOLD};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("estimated reading time must be > 0 minutes")]
    InvalidReadingTime,

    #[error("page count must be > 0 when set")]
    InvalidPageCount,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// What a single sample did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerUpdate {
    pub progress: f64,
    /// True only for the sample that crossed the completion threshold.
    pub completed_now: bool,
}
