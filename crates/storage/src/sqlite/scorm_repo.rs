use chrono::{DateTime, Utc};
use lms_core::model::{CourseId, UserId};
use lms_core::time::format_hms;

use super::SqliteRepository;
use super::mapping::{SCORM_COLUMNS, conn, id_to_i64, map_scorm_row, to_json};
use crate::repository::{ScormRecord, ScormRepository, ScormSnapshot, StorageError};

#[async_trait::async_trait]
impl ScormRepository for SqliteRepository {
    async fn upsert_scorm(
        &self,
        snapshot: &ScormSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ScormRecord, StorageError> {
        let sql = format!(
            r"
            INSERT INTO scorm_data (
                user_id, course_id, lesson_status, score_raw, score_min, score_max,
                session_time, total_time, location, suspend_data, interactions, objectives,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                lesson_status = excluded.lesson_status,
                score_raw = excluded.score_raw,
                score_min = excluded.score_min,
                score_max = excluded.score_max,
                session_time = excluded.session_time,
                total_time = excluded.total_time,
                location = excluded.location,
                suspend_data = excluded.suspend_data,
                interactions = excluded.interactions,
                objectives = excluded.objectives,
                updated_at = excluded.updated_at
            RETURNING {SCORM_COLUMNS}
            "
        );

        let row = sqlx::query(&sql)
            .bind(id_to_i64("user_id", snapshot.user_id.value())?)
            .bind(id_to_i64("course_id", snapshot.course_id.value())?)
            .bind(snapshot.lesson_status.as_str())
            .bind(snapshot.score.raw)
            .bind(snapshot.score.min)
            .bind(snapshot.score.max)
            .bind(format_hms(snapshot.session_time))
            .bind(format_hms(snapshot.total_time))
            .bind(&snapshot.location)
            .bind(&snapshot.suspend_data)
            .bind(to_json(&snapshot.interactions)?)
            .bind(to_json(&snapshot.objectives)?)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;

        map_scorm_row(&row)
    }

    async fn recent_scorm(&self, limit: u32) -> Result<Vec<ScormRecord>, StorageError> {
        let sql = format!(
            "SELECT {SCORM_COLUMNS} FROM scorm_data ORDER BY updated_at DESC, id DESC LIMIT ?1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_scorm_row).collect()
    }

    async fn get_scorm(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<ScormRecord>, StorageError> {
        let sql =
            format!("SELECT {SCORM_COLUMNS} FROM scorm_data WHERE user_id = ?1 AND course_id = ?2");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("course_id", course_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_scorm_row).transpose()
    }
}
