use thiserror::Error;

use crate::builder::BuilderError;
use crate::quiz::QuizError;
use crate::scorm::LedgerError;
use crate::tracking::TrackerError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Builder(#[from] BuilderError),
}
