use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use lms_core::model::{CourseId, InteractionEvent, LessonStatus, Objective, Score, UserId};
use lms_core::time::{format_hms, parse_hms};
use serde::{Deserialize, Serialize};
use services::{RECENT_SCORM_LIMIT, TrackingError};
use storage::repository::{ScormRecord, ScormSnapshot};

use crate::AppState;
use crate::error::ApiError;

const FETCH_FAILED: &str = "Failed to fetch SCORM data";
const SAVE_FAILED: &str = "Failed to save SCORM data";

/// A bare number is the raw score on the default 0..100 scale.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Raw(f64),
    Full {
        raw: f64,
        #[serde(default)]
        min: f64,
        #[serde(default = "default_max")]
        max: f64,
    },
}

fn default_max() -> f64 {
    100.0
}

impl From<ScoreInput> for Score {
    fn from(input: ScoreInput) -> Self {
        match input {
            ScoreInput::Raw(raw) => Score {
                raw,
                ..Score::default()
            },
            ScoreInput::Full { raw, min, max } => Score { raw, min, max },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub user_id: UserId,
    pub course_id: CourseId,
    #[serde(default)]
    pub lesson_status: LessonStatus,
    #[serde(default)]
    pub score: Option<ScoreInput>,
    #[serde(default)]
    pub session_time: Option<String>,
    /// Defaults to the session time.
    #[serde(default)]
    pub total_time: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub suspend_data: String,
    #[serde(default)]
    pub interactions: Vec<InteractionEvent>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
}

impl TrackRequest {
    fn into_snapshot(self) -> Result<ScormSnapshot, ApiError> {
        let score = self.score.map(Score::from).unwrap_or_default();
        if !(score.min..=score.max).contains(&score.raw) {
            return Err(ApiError::bad_request(
                "score must be finite and within [min, max]",
            ));
        }
        let session_time = match self.session_time.as_deref() {
            Some(raw) => parse_hms(raw)
                .map_err(|_| ApiError::bad_request("sessionTime must be HH:MM:SS"))?,
            None => chrono::Duration::zero(),
        };
        let total_time = match self.total_time.as_deref() {
            Some(raw) => {
                parse_hms(raw).map_err(|_| ApiError::bad_request("totalTime must be HH:MM:SS"))?
            }
            None => session_time,
        };
        Ok(ScormSnapshot {
            user_id: self.user_id,
            course_id: self.course_id,
            lesson_status: self.lesson_status,
            score,
            session_time,
            total_time,
            location: self.location,
            suspend_data: self.suspend_data,
            interactions: self.interactions,
            objectives: self.objectives,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScormDataResponse {
    pub id: i64,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub lesson_status: LessonStatus,
    pub score: Score,
    pub session_time: String,
    pub total_time: String,
    pub location: String,
    pub suspend_data: String,
    pub interactions: Vec<InteractionEvent>,
    pub objectives: Vec<Objective>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScormRecord> for ScormDataResponse {
    fn from(record: ScormRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            course_id: record.course_id,
            lesson_status: record.lesson_status,
            score: record.score,
            session_time: format_hms(record.session_time),
            total_time: format_hms(record.total_time),
            location: record.location,
            suspend_data: record.suspend_data,
            interactions: record.interactions,
            objectives: record.objectives,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

pub async fn recent(State(state): State<AppState>) -> Result<Json<Vec<ScormDataResponse>>, ApiError> {
    let rows = state
        .services
        .tracking()
        .recent(RECENT_SCORM_LIMIT)
        .await
        .map_err(|e| ApiError::internal(FETCH_FAILED, e))?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn track(
    State(state): State<AppState>,
    payload: Result<Json<TrackRequest>, JsonRejection>,
) -> Result<Json<ScormDataResponse>, ApiError> {
    let Json(request) = payload?;
    let snapshot = request.into_snapshot()?;
    let record = state
        .services
        .tracking()
        .save(snapshot)
        .await
        .map_err(|e| match e {
            TrackingError::InvalidScore => ApiError::bad_request(e.to_string()),
            other => ApiError::internal(SAVE_FAILED, other),
        })?;
    Ok(Json(record.into()))
}
