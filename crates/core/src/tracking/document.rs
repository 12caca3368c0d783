use chrono::Duration;

use crate::model::{InteractionDraft, InteractionKind, InteractionResult, LessonStatus, ModuleId};
use crate::scorm::ProgressSink;

use super::{TrackerError, TrackerUpdate};

/// Percentage read at which a document counts as completed.
pub const DOCUMENT_COMPLETION_THRESHOLD: f64 = 95.0;

const READING_SAMPLE_EVERY_SECS: u64 = 30;

/// Reading parameters of a document module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentModule {
    pub id: ModuleId,
    pub estimated_reading_minutes: u32,
    pub pages: Option<u32>,
}

/// Tracks reading of one document module.
///
/// Progress is the maximum of the time-based estimate and any page or scroll
/// position seen so far; it never decreases.
#[derive(Debug, Clone)]
pub struct DocumentTracker {
    module: DocumentModule,
    elapsed_secs: u64,
    progress: f64,
    current_page: u32,
    started: bool,
    completed: bool,
}

impl DocumentTracker {
    /// # Errors
    ///
    /// Returns `TrackerError::InvalidReadingTime` for a zero reading estimate
    /// and `TrackerError::InvalidPageCount` for `Some(0)` pages.
    pub fn new(module: DocumentModule) -> Result<Self, TrackerError> {
        if module.estimated_reading_minutes == 0 {
            return Err(TrackerError::InvalidReadingTime);
        }
        if module.pages == Some(0) {
            return Err(TrackerError::InvalidPageCount);
        }
        Ok(Self {
            module,
            elapsed_secs: 0,
            progress: 0.0,
            current_page: 1,
            started: false,
            completed: false,
        })
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn estimated_secs(&self) -> u64 {
        u64::from(self.module.estimated_reading_minutes) * 60
    }

    /// Begin reading. Only the first call has an effect.
    pub fn start(&mut self, sink: &mut dyn ProgressSink) {
        if self.started {
            return;
        }
        self.started = true;
        sink.set_lesson_status(LessonStatus::Incomplete);
        sink.record_interaction(
            InteractionDraft::new(
                format!("document_start_{}", self.module.id),
                InteractionKind::Choice,
                "started_reading",
            )
            .with_correct(["started_reading"])
            .with_result(InteractionResult::Correct),
        );
    }

    /// One second of active reading.
    ///
    /// No-op (returns `Ok(None)`) before `start` and after completion.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors from the sink.
    pub fn tick(
        &mut self,
        sink: &mut dyn ProgressSink,
    ) -> Result<Option<TrackerUpdate>, TrackerError> {
        if !self.started || self.completed {
            return Ok(None);
        }
        self.elapsed_secs += 1;

        #[allow(clippy::cast_precision_loss)]
        let by_time =
            ((self.elapsed_secs as f64 * 100.0) / self.estimated_secs() as f64).min(100.0);

        if self.elapsed_secs % READING_SAMPLE_EVERY_SECS == 0 {
            sink.record_interaction(
                InteractionDraft::new(
                    format!("document_{}_{}s", self.module.id, self.elapsed_secs),
                    InteractionKind::Performance,
                    format!("reading_time_{}s", self.elapsed_secs),
                )
                .with_correct([format!("{}s", self.estimated_secs())])
                .with_latency(Duration::seconds(30)),
            );
        }

        self.advance(by_time, sink).map(Some)
    }

    /// A 1-based page became visible. Out-of-range pages and documents without
    /// pagination are ignored.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors from the sink.
    pub fn view_page(
        &mut self,
        page: u32,
        sink: &mut dyn ProgressSink,
    ) -> Result<Option<TrackerUpdate>, TrackerError> {
        let Some(pages) = self.module.pages else {
            return Ok(None);
        };
        if page == 0 || page > pages {
            return Ok(None);
        }
        self.current_page = page;

        sink.record_interaction(
            InteractionDraft::new(
                format!("page_view_{}_{page}", self.module.id),
                InteractionKind::Choice,
                format!("viewed_page_{page}"),
            )
            .with_correct([format!("page_{page}")])
            .with_result(InteractionResult::Correct),
        );

        let by_page = f64::from(page) * 100.0 / f64::from(pages);
        if by_page > self.progress {
            return self.advance(by_page, sink).map(Some);
        }
        Ok(None)
    }

    /// Scroll position as a fraction in [0, 1] of the scrollable height.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors from the sink.
    pub fn scroll(
        &mut self,
        fraction: f64,
        sink: &mut dyn ProgressSink,
    ) -> Result<Option<TrackerUpdate>, TrackerError> {
        if !fraction.is_finite() {
            return Ok(None);
        }
        let by_scroll = (fraction * 100.0).clamp(0.0, 100.0);
        if by_scroll > self.progress {
            return self.advance(by_scroll, sink).map(Some);
        }
        Ok(None)
    }

    pub fn download(&mut self, sink: &mut dyn ProgressSink) {
        sink.record_interaction(
            InteractionDraft::new(
                format!("download_{}", self.module.id),
                InteractionKind::Choice,
                "downloaded_document",
            )
            .with_correct(["downloaded"])
            .with_result(InteractionResult::Correct),
        );
    }

    fn advance(
        &mut self,
        candidate: f64,
        sink: &mut dyn ProgressSink,
    ) -> Result<TrackerUpdate, TrackerError> {
        self.progress = self.progress.max(candidate);
        let reported = if self.completed { 100.0 } else { self.progress };
        sink.update_progress(&self.module.id, reported)?;

        let completed_now = !self.completed && self.progress >= DOCUMENT_COMPLETION_THRESHOLD;
        if completed_now {
            self.completed = true;
            sink.set_lesson_status(LessonStatus::Completed);
            sink.set_score(100.0, 0.0, 100.0)?;
        }

        Ok(TrackerUpdate {
            progress: self.progress,
            completed_now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorm::ScormSession;
    use crate::time::fixed_clock;

    fn module(minutes: u32, pages: Option<u32>) -> DocumentModule {
        DocumentModule {
            id: ModuleId::new("doc-contracts"),
            estimated_reading_minutes: minutes,
            pages,
        }
    }

    #[test]
    fn rejects_zero_reading_time() {
        assert_eq!(
            DocumentTracker::new(module(0, None)).unwrap_err(),
            TrackerError::InvalidReadingTime
        );
        assert_eq!(
            DocumentTracker::new(module(5, Some(0))).unwrap_err(),
            TrackerError::InvalidPageCount
        );
    }

    #[test]
    fn ticks_do_nothing_before_start() {
        let mut doc = DocumentTracker::new(module(8, None)).unwrap();
        let mut session = ScormSession::new(fixed_clock());
        assert!(doc.tick(&mut session).unwrap().is_none());
        assert_eq!(doc.elapsed_secs(), 0);
    }

    #[test]
    fn eight_minute_document_completes_after_456_seconds() {
        let mut doc = DocumentTracker::new(module(8, None)).unwrap();
        let mut session = ScormSession::new(fixed_clock());
        doc.start(&mut session);

        for _ in 0..455 {
            let update = doc.tick(&mut session).unwrap().unwrap();
            assert!(!update.completed_now);
        }
        assert!(doc.progress() < DOCUMENT_COMPLETION_THRESHOLD);

        let update = doc.tick(&mut session).unwrap().unwrap();
        assert!(update.completed_now);
        assert!((update.progress - 95.0).abs() < 1e-9);
        assert_eq!(session.ledger().lesson_status(), LessonStatus::Completed);
        assert!((session.ledger().score().raw - 100.0).abs() < f64::EPSILON);

        // Completed documents stop counting.
        assert!(doc.tick(&mut session).unwrap().is_none());
    }

    #[test]
    fn reading_samples_every_thirty_seconds() {
        let mut doc = DocumentTracker::new(module(8, None)).unwrap();
        let mut session = ScormSession::new(fixed_clock());
        doc.start(&mut session);
        for _ in 0..90 {
            doc.tick(&mut session).unwrap();
        }
        let responses: Vec<_> = session
            .ledger()
            .interactions()
            .iter()
            .map(|i| i.learner_response.as_str())
            .collect();
        assert_eq!(
            responses,
            vec![
                "started_reading",
                "reading_time_30s",
                "reading_time_60s",
                "reading_time_90s"
            ]
        );
    }

    #[test]
    fn progress_never_decreases() {
        let mut doc = DocumentTracker::new(module(10, Some(4))).unwrap();
        let mut session = ScormSession::new(fixed_clock());
        doc.start(&mut session);

        let update = doc.view_page(2, &mut session).unwrap().unwrap();
        assert!((update.progress - 50.0).abs() < 1e-9);

        // A tick's time-based value (1/600) is lower; progress holds at 50.
        let update = doc.tick(&mut session).unwrap().unwrap();
        assert!((update.progress - 50.0).abs() < 1e-9);

        // Going back a page or scrolling up does not lower it either.
        assert!(doc.view_page(1, &mut session).unwrap().is_none());
        assert!(doc.scroll(0.2, &mut session).unwrap().is_none());
        assert!((doc.progress() - 50.0).abs() < 1e-9);
        assert_eq!(doc.current_page(), 1);
    }

    #[test]
    fn last_page_completes() {
        let mut doc = DocumentTracker::new(module(10, Some(4))).unwrap();
        let mut session = ScormSession::new(fixed_clock());
        doc.start(&mut session);
        assert!(doc.view_page(9, &mut session).unwrap().is_none());
        let update = doc.view_page(4, &mut session).unwrap().unwrap();
        assert!(update.completed_now);
        assert!(doc.is_completed());
    }

    #[test]
    fn completed_document_stays_completed_after_more_reading() {
        let mut doc = DocumentTracker::new(module(10, Some(20))).unwrap();
        let mut session = ScormSession::new(fixed_clock());
        doc.start(&mut session);

        let update = doc.view_page(19, &mut session).unwrap().unwrap();
        assert!(update.completed_now);
        assert_eq!(session.ledger().lesson_status(), LessonStatus::Completed);

        let update = doc.scroll(0.97, &mut session).unwrap().unwrap();
        assert!(!update.completed_now);
        assert!((doc.progress() - 97.0).abs() < 1e-9);
        assert_eq!(session.ledger().lesson_status(), LessonStatus::Completed);

        doc.view_page(20, &mut session).unwrap();
        assert_eq!(session.ledger().lesson_status(), LessonStatus::Completed);
    }

    #[test]
    fn scrolling_advances_progress() {
        let mut doc = DocumentTracker::new(module(10, None)).unwrap();
        let mut session = ScormSession::new(fixed_clock());
        let update = doc.scroll(0.6, &mut session).unwrap().unwrap();
        assert!((update.progress - 60.0).abs() < 1e-9);
        assert_eq!(session.ledger().lesson_status(), LessonStatus::Incomplete);
        doc.download(&mut session);
        assert_eq!(
            session.ledger().interactions()[0].learner_response,
            "downloaded_document"
        );
    }
}
