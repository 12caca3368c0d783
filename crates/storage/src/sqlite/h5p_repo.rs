use chrono::{DateTime, Utc};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_h5p_row};
use crate::repository::{H5pRecord, H5pRepository, NewH5pRecord, StorageError};

const H5P_COLUMNS: &str =
    "id, title, content_type, content, parameters, tracking, author_id, published, created_at";

#[async_trait::async_trait]
impl H5pRepository for SqliteRepository {
    async fn insert_h5p(
        &self,
        content: NewH5pRecord,
        now: DateTime<Utc>,
    ) -> Result<H5pRecord, StorageError> {
        let author = content
            .author_id
            .map(|a| id_to_i64("author_id", a.value()))
            .transpose()?;
        let sql = format!(
            r"
            INSERT INTO h5p_content (title, content_type, content, parameters, tracking, author_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING {H5P_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(content.title)
            .bind(content.content_type)
            .bind(content.content)
            .bind(content.parameters)
            .bind(i64::from(content.tracking))
            .bind(author)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;

        map_h5p_row(&row)
    }

    async fn list_h5p(&self) -> Result<Vec<H5pRecord>, StorageError> {
        let sql = format!("SELECT {H5P_COLUMNS} FROM h5p_content ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_h5p_row).collect()
    }
}
