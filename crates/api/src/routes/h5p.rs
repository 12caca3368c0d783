use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use lms_core::model::{ContentId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::{H5pServiceError, NewH5pContent};
use storage::repository::H5pRecord;

use crate::AppState;
use crate::error::ApiError;

const FETCH_FAILED: &str = "Failed to fetch H5P content";
const SAVE_FAILED: &str = "Failed to save H5P content";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H5pTrackRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub tracking: bool,
    #[serde(default)]
    pub author_id: Option<UserId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct H5pResponse {
    pub id: ContentId,
    pub title: String,
    pub content_type: String,
    pub content: Option<String>,
    pub parameters: Option<Value>,
    pub tracking: bool,
    pub author_id: Option<UserId>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl From<H5pRecord> for H5pResponse {
    fn from(record: H5pRecord) -> Self {
        // Stored parameters that are not JSON are passed through as a string.
        let parameters = record
            .parameters
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)));
        Self {
            id: record.id,
            title: record.title,
            content_type: record.content_type,
            content: record.content,
            parameters,
            tracking: record.tracking,
            author_id: record.author_id,
            published: record.published,
            created_at: record.created_at,
        }
    }
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<H5pResponse>>, ApiError> {
    let items = state
        .services
        .h5p()
        .list()
        .await
        .map_err(|e| ApiError::internal(FETCH_FAILED, e))?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<H5pTrackRequest>, JsonRejection>,
) -> Result<Json<H5pResponse>, ApiError> {
    let Json(request) = payload?;
    let record = state
        .services
        .h5p()
        .create(NewH5pContent {
            title: request.title,
            content_type: request.content_type,
            content: request.content,
            parameters: request.parameters,
            tracking: request.tracking,
            author_id: request.author_id,
        })
        .await
        .map_err(|e| match e {
            H5pServiceError::MissingField(_) | H5pServiceError::UnknownAuthor(_) => {
                ApiError::bad_request(e.to_string())
            }
            other => ApiError::internal(SAVE_FAILED, other),
        })?;
    Ok(Json(record.into()))
}
