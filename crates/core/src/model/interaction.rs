use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// SCORM interaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    Choice,
    FillIn,
    Matching,
    Performance,
    Sequencing,
    Likert,
    Numeric,
}

/// Evaluated outcome of a learner response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionResult {
    Correct,
    Incorrect,
    Unanticipated,
    Neutral,
}

impl InteractionResult {
    /// `Correct` when `matched`, otherwise `Incorrect`.
    #[must_use]
    pub fn from_match(matched: bool) -> Self {
        if matched { Self::Correct } else { Self::Incorrect }
    }
}

/// One recorded learner response. Immutable once appended to a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub timestamp: DateTime<Utc>,
    pub learner_response: String,
    #[serde(default)]
    pub correct_responses: Vec<String>,
    pub result: InteractionResult,
    #[serde(default = "default_weighting")]
    pub weighting: f64,
    #[serde(with = "crate::time::hms", default = "zero_latency")]
    pub latency: Duration,
}

fn default_weighting() -> f64 {
    1.0
}

fn zero_latency() -> Duration {
    Duration::zero()
}

/// An interaction as reported by a tracker, before the ledger stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionDraft {
    pub id: String,
    pub kind: InteractionKind,
    pub learner_response: String,
    pub correct_responses: Vec<String>,
    pub result: InteractionResult,
    pub weighting: f64,
    pub latency: Duration,
}

impl InteractionDraft {
    /// A neutral, weight-1 draft with a one second latency.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: InteractionKind, response: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            learner_response: response.into(),
            correct_responses: Vec::new(),
            result: InteractionResult::Neutral,
            weighting: 1.0,
            latency: Duration::seconds(1),
        }
    }

    #[must_use]
    pub fn with_correct<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correct_responses = responses.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: InteractionResult) -> Self {
        self.result = result;
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn with_weighting(mut self, weighting: f64) -> Self {
        self.weighting = weighting;
        self
    }

    /// Stamp the draft, producing the immutable event.
    #[must_use]
    pub fn stamp(self, timestamp: DateTime<Utc>) -> InteractionEvent {
        InteractionEvent {
            id: self.id,
            kind: self.kind,
            timestamp,
            learner_response: self.learner_response,
            correct_responses: self.correct_responses,
            result: self.result,
            weighting: self.weighting,
            latency: self.latency,
        }
    }
}
