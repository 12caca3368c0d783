use chrono::{DateTime, Utc};
use lms_core::model::{CourseId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_course_progress_row, map_enrollment_row};
use crate::repository::{
    CourseProgressRecord, EnrollmentRecord, EnrollmentRepository, StorageError, round_progress,
};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn upsert_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        progress: f64,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, StorageError> {
        let progress = round_progress(progress);
        let completed_at = (progress >= 100.0).then_some(now);

        let row = sqlx::query(
            r"
            INSERT INTO enrollments (user_id, course_id, progress, completed_at, enrolled_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                progress = excluded.progress,
                completed_at = excluded.completed_at
            RETURNING id, user_id, course_id, progress, completed_at, enrolled_at
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(progress)
        .bind(completed_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_enrollment_row(&row)
    }

    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT e.course_id, e.progress, e.enrolled_at, e.completed_at,
                   c.title AS course_title, c.description AS course_description
            FROM enrollments e
            LEFT JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = ?1
            ORDER BY e.enrolled_at DESC, e.id DESC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_course_progress_row).collect()
    }

    async fn list_enrollments(&self) -> Result<Vec<EnrollmentRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, course_id, progress, completed_at, enrolled_at
            FROM enrollments
            ORDER BY enrolled_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_enrollment_row).collect()
    }
}
