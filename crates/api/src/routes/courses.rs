use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use lms_core::builder::Course;
use lms_core::model::{CourseId, ParseIdError, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::CourseServiceError;
use storage::repository::CourseRecord;

use crate::AppState;
use crate::error::ApiError;

const FETCH_FAILED: &str = "Failed to fetch courses";
const SAVE_FAILED: &str = "Failed to save course";

/// A course builder export, optionally with catalogue flags.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[serde(flatten)]
    pub course: Course,
    #[serde(default)]
    pub author_id: Option<UserId>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub author_id: Option<UserId>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl CourseResponse {
    fn summary(record: CourseRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            author_id: record.author_id,
            published: record.published,
            created_at: record.created_at,
            updated_at: record.updated_at,
            content: None,
        }
    }

    fn detailed(mut record: CourseRecord) -> Self {
        let content = record
            .content
            .take()
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)));
        Self {
            content,
            ..Self::summary(record)
        }
    }
}

fn parse_course_id(raw: &str) -> Result<CourseId, ApiError> {
    raw.parse()
        .map_err(|e: ParseIdError| ApiError::bad_request(e.to_string()))
}

fn map_error(context: &'static str) -> impl Fn(CourseServiceError) -> ApiError {
    move |e| match e {
        CourseServiceError::EmptyTitle | CourseServiceError::UnknownAuthor(_) => {
            ApiError::bad_request(e.to_string())
        }
        CourseServiceError::NotFound => ApiError::NotFound,
        other => ApiError::internal(context, other),
    }
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<CourseResponse>>, ApiError> {
    let rows = state
        .services
        .courses()
        .list()
        .await
        .map_err(map_error(FETCH_FAILED))?;
    Ok(Json(rows.into_iter().map(CourseResponse::summary).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseResponse>, ApiError> {
    let id = parse_course_id(&id)?;
    let record = state
        .services
        .courses()
        .get(id)
        .await
        .map_err(map_error(FETCH_FAILED))?;
    Ok(Json(CourseResponse::detailed(record)))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateCourseRequest>, JsonRejection>,
) -> Result<Json<CourseResponse>, ApiError> {
    let Json(request) = payload?;
    let record = state
        .services
        .courses()
        .create(request.course, request.author_id, request.published)
        .await
        .map_err(map_error(SAVE_FAILED))?;
    Ok(Json(CourseResponse::detailed(record)))
}

pub async fn set_published(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<CourseResponse>, ApiError> {
    let id = parse_course_id(&id)?;
    let Json(request) = payload?;
    let record = state
        .services
        .courses()
        .set_published(id, request.published)
        .await
        .map_err(map_error(SAVE_FAILED))?;
    Ok(Json(CourseResponse::summary(record)))
}
