use chrono::Duration;
use lms_core::model::{ContentId, CourseId, LessonStatus, Score, UserId};
use lms_core::time::parse_hms;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{
    CourseProgressRecord, CourseRecord, EnrollmentRecord, H5pRecord, ScormRecord, StorageError,
    UserRecord,
};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        other => StorageError::Connection(other.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn content_id_from_i64(v: i64) -> Result<ContentId, StorageError> {
    Ok(ContentId::new(i64_to_u64("content_id", v)?))
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn from_json<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(format!("{field}: {e}")))
}

fn duration_col(row: &SqliteRow, col: &'static str) -> Result<Duration, StorageError> {
    let raw: String = row.try_get(col).map_err(ser)?;
    parse_hms(&raw).map_err(|e| StorageError::Serialization(format!("{col}: {e}")))
}

pub(crate) fn parse_lesson_status(s: &str) -> Result<LessonStatus, StorageError> {
    LessonStatus::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid lesson status: {s}")))
}

pub(crate) const SCORM_COLUMNS: &str = "id, user_id, course_id, lesson_status, score_raw, \
     score_min, score_max, session_time, total_time, location, suspend_data, interactions, \
     objectives, created_at, updated_at";

pub(crate) fn map_scorm_row(row: &SqliteRow) -> Result<ScormRecord, StorageError> {
    let status: String = row.try_get("lesson_status").map_err(ser)?;
    let interactions: String = row.try_get("interactions").map_err(ser)?;
    let objectives: String = row.try_get("objectives").map_err(ser)?;
    Ok(ScormRecord {
        id: row.try_get("id").map_err(ser)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        lesson_status: parse_lesson_status(&status)?,
        score: Score {
            raw: row.try_get("score_raw").map_err(ser)?,
            min: row.try_get("score_min").map_err(ser)?,
            max: row.try_get("score_max").map_err(ser)?,
        },
        session_time: duration_col(row, "session_time")?,
        total_time: duration_col(row, "total_time")?,
        location: row.try_get("location").map_err(ser)?,
        suspend_data: row.try_get("suspend_data").map_err(ser)?,
        interactions: from_json("interactions", &interactions)?,
        objectives: from_json("objectives", &objectives)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<EnrollmentRecord, StorageError> {
    Ok(EnrollmentRecord {
        id: row.try_get("id").map_err(ser)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        progress: row.try_get("progress").map_err(ser)?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_course_progress_row(
    row: &SqliteRow,
) -> Result<CourseProgressRecord, StorageError> {
    Ok(CourseProgressRecord {
        course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        progress: row.try_get("progress").map_err(ser)?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        course_title: row.try_get("course_title").map_err(ser)?,
        course_description: row.try_get("course_description").map_err(ser)?,
    })
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<CourseRecord, StorageError> {
    Ok(CourseRecord {
        id: course_id_from_i64(row.try_get("id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        author_id: row
            .try_get::<Option<i64>, _>("author_id")
            .map_err(ser)?
            .map(user_id_from_i64)
            .transpose()?,
        published: row.try_get::<i64, _>("published").map_err(ser)? != 0,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_h5p_row(row: &SqliteRow) -> Result<H5pRecord, StorageError> {
    Ok(H5pRecord {
        id: content_id_from_i64(row.try_get("id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        content_type: row.try_get("content_type").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        parameters: row.try_get("parameters").map_err(ser)?,
        tracking: row.try_get::<i64, _>("tracking").map_err(ser)? != 0,
        author_id: row
            .try_get::<Option<i64>, _>("author_id")
            .map_err(ser)?
            .map(user_id_from_i64)
            .transpose()?,
        published: row.try_get::<i64, _>("published").map_err(ser)? != 0,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<UserRecord, StorageError> {
    Ok(UserRecord {
        id: user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        username: row.try_get("username").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        role: row.try_get("role").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
