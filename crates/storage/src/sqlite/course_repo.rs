use chrono::{DateTime, Utc};
use lms_core::model::{CourseId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_course_row};
use crate::repository::{CourseRecord, CourseRepository, NewCourseRecord, StorageError};

const COURSE_COLUMNS: &str =
    "id, title, description, content, author_id, published, created_at, updated_at";

fn author_to_i64(author: Option<UserId>) -> Result<Option<i64>, StorageError> {
    author.map(|a| id_to_i64("author_id", a.value())).transpose()
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_course(
        &self,
        course: NewCourseRecord,
        now: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError> {
        let sql = format!(
            r"
            INSERT INTO courses (title, description, content, author_id, published, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING {COURSE_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(course.title)
            .bind(course.description)
            .bind(course.content)
            .bind(author_to_i64(course.author_id)?)
            .bind(i64::from(course.published))
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;

        map_course_row(&row)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<CourseRecord>, StorageError> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self) -> Result<Vec<CourseRecord>, StorageError> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_course_row).collect()
    }

    async fn set_published(
        &self,
        id: CourseId,
        published: bool,
        now: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError> {
        let sql = format!(
            "UPDATE courses SET published = ?1, updated_at = ?2 WHERE id = ?3 RETURNING {COURSE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(i64::from(published))
            .bind(now)
            .bind(id_to_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_course_row(&row)
    }
}
