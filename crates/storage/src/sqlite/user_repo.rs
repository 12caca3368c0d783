use chrono::{DateTime, Utc};
use lms_core::model::UserId;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_user_row};
use crate::repository::{NewUserRecord, StorageError, UserRecord, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(
        &self,
        user: NewUserRecord,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO users (username, password, name, email, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, username, name, email, role, created_at
            ",
        )
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.name)
        .bind(user.email)
        .bind(user.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_user_row(&row)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT id, username, name, email, role, created_at FROM users WHERE id = ?1",
        )
        .bind(id_to_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT id, username, name, email, role, created_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_user_row).transpose()
    }
}
