mod ids;
mod interaction;
mod ledger;

pub use ids::{ContentId, CourseId, ModuleId, ParseIdError, UserId};

pub use interaction::{InteractionDraft, InteractionEvent, InteractionKind, InteractionResult};
pub use ledger::{LedgerParts, LessonStatus, Objective, ObjectiveStatus, ProgressLedger, Score};
