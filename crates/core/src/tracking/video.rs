use crate::model::{InteractionDraft, InteractionKind, LessonStatus, ModuleId};
use crate::scorm::ProgressSink;

use super::{TrackerError, TrackerUpdate};

/// Percentage watched at which a video counts as completed.
pub const VIDEO_COMPLETION_THRESHOLD: f64 = 90.0;

/// Tracks playback of one video module.
///
/// Progress is the playback position over the media duration. It follows the
/// playhead, so seeking backwards lowers it, except that once the completion
/// threshold has been crossed the module is reported to the ledger as 100.
#[derive(Debug, Clone)]
pub struct VideoTracker {
    module_id: ModuleId,
    started: bool,
    playing: bool,
    completed: bool,
    progress: f64,
    samples: u64,
}

impl VideoTracker {
    #[must_use]
    pub fn new(module_id: ModuleId) -> Self {
        Self {
            module_id,
            started: false,
            playing: false,
            completed: false,
            progress: 0.0,
            samples: 0,
        }
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Playback started. The first play marks the lesson incomplete.
    pub fn play(&mut self, sink: &mut dyn ProgressSink) {
        self.playing = true;
        if !self.started {
            self.started = true;
            if !self.completed {
                sink.set_lesson_status(LessonStatus::Incomplete);
            }
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Native time-update sample.
    ///
    /// Returns `Ok(None)` while the duration is unknown (zero, negative, or not
    /// finite) or the position is not a finite number.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors from the sink.
    pub fn time_update(
        &mut self,
        current_secs: f64,
        duration_secs: f64,
        sink: &mut dyn ProgressSink,
    ) -> Result<Option<TrackerUpdate>, TrackerError> {
        if !(duration_secs.is_finite() && duration_secs > 0.0) || !current_secs.is_finite() {
            return Ok(None);
        }

        let progress = (current_secs / duration_secs * 100.0).clamp(0.0, 100.0);
        self.progress = progress;
        self.samples += 1;

        let reported = if self.completed { 100.0 } else { progress };
        sink.update_progress(&self.module_id, reported)?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let watched = progress.floor() as u32;
        sink.record_interaction(
            InteractionDraft::new(
                format!("video_{}_{}", self.module_id, self.samples),
                InteractionKind::Performance,
                format!("watched_{watched}%"),
            )
            .with_correct(["100%"]),
        );

        let completed_now = !self.completed && progress >= VIDEO_COMPLETION_THRESHOLD;
        if completed_now {
            self.completed = true;
            sink.set_lesson_status(LessonStatus::Completed);
            sink.set_score(100.0, 0.0, 100.0)?;
        }

        Ok(Some(TrackerUpdate {
            progress,
            completed_now,
        }))
    }

    /// Seek back to the start.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors from the sink.
    pub fn restart(&mut self, sink: &mut dyn ProgressSink) -> Result<(), TrackerError> {
        self.progress = 0.0;
        let reported = if self.completed { 100.0 } else { 0.0 };
        sink.update_progress(&self.module_id, reported)?;
        Ok(())
    }
}
