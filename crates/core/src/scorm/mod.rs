//! SCORM-style tracking: the per-learner session that owns the progress
//! ledger, its event log, and its observers.

mod event;
mod session;

pub use event::LedgerEvent;
pub use session::{LedgerError, ProgressSink, ScormSession, SubscriptionId};
