use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use lms_core::model::{CourseId, UserId};
use serde::{Deserialize, Serialize};
use services::ProgressError;
use storage::repository::{CourseProgressRecord, EnrollmentRecord};

use crate::AppState;
use crate::error::ApiError;

const FETCH_FAILED: &str = "Failed to fetch course progress";
const UPDATE_FAILED: &str = "Failed to update course progress";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub id: i64,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress: f64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<EnrollmentRecord> for EnrollmentResponse {
    fn from(r: EnrollmentRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            course_id: r.course_id,
            progress: r.progress,
            enrolled_at: r.enrolled_at,
            completed_at: r.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressResponse {
    pub course_id: CourseId,
    pub progress: f64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub course_title: Option<String>,
    pub course_description: Option<String>,
}

impl From<CourseProgressRecord> for CourseProgressResponse {
    fn from(r: CourseProgressRecord) -> Self {
        Self {
            course_id: r.course_id,
            progress: r.progress,
            enrolled_at: r.enrolled_at,
            completed_at: r.completed_at,
            course_title: r.course_title,
            course_description: r.course_description,
        }
    }
}

pub async fn for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<CourseProgressResponse>>, ApiError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|e: lms_core::model::ParseIdError| ApiError::bad_request(e.to_string()))?;
    let rows = state
        .services
        .progress()
        .course_progress(user_id)
        .await
        .map_err(|e| ApiError::internal(FETCH_FAILED, e))?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn record(
    State(state): State<AppState>,
    payload: Result<Json<ProgressRequest>, JsonRejection>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    let Json(request) = payload?;
    let row = state
        .services
        .progress()
        .record_progress(request.user_id, request.course_id, request.progress)
        .await
        .map_err(|e| match e {
            ProgressError::OutOfRange(_) => ApiError::bad_request(e.to_string()),
            other => ApiError::internal(UPDATE_FAILED, other),
        })?;
    Ok(Json(row.into()))
}
