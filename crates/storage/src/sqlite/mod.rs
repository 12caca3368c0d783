use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod course_repo;
mod enrollment_repo;
mod h5p_repo;
mod mapping;
mod migrate;
mod scorm_repo;
mod user_repo;

const MAX_FILE_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite backend for every repository trait. Cheap to clone; clones share
/// the pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Where the database lives, as far as pool sizing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatabaseKind {
    File,
    /// `mode=memory&cache=shared`: every connection sees one database while
    /// at least one stays open.
    SharedMemory,
    /// `sqlite::memory:`: each connection is its own database.
    PrivateMemory,
}

impl DatabaseKind {
    fn of(url: &str) -> Self {
        if url.contains("mode=memory") && url.contains("cache=shared") {
            Self::SharedMemory
        } else if url.contains(":memory:") || url.contains("mode=memory") {
            Self::PrivateMemory
        } else {
            Self::File
        }
    }

    fn pool_options(self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().acquire_timeout(ACQUIRE_TIMEOUT);
        match self {
            Self::File => options.max_connections(MAX_FILE_CONNECTIONS),
            // Closing the last connection drops an in-memory database.
            Self::SharedMemory => options
                .max_connections(MAX_FILE_CONNECTIONS)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
            Self::PrivateMemory => options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// File databases are created when missing and run in WAL mode. Foreign
    /// keys are enforced on every connection.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL does not parse or the connection
    /// cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let kind = DatabaseKind::of(database_url);
        let mut connect = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if kind == DatabaseKind::File {
            connect = connect
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);
        }
        let pool = kind.pool_options().connect_with(connect).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Connect, migrate, and expose every repository over one pool.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self::from_repo(repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use lms_core::model::{CourseId, UserId};

    use crate::repository::EnrollmentRepository;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn classifies_database_urls() {
        assert_eq!(DatabaseKind::of("sqlite://lms.sqlite3"), DatabaseKind::File);
        assert_eq!(DatabaseKind::of("sqlite::memory:"), DatabaseKind::PrivateMemory);
        assert_eq!(
            DatabaseKind::of("sqlite:file:lms?mode=memory"),
            DatabaseKind::PrivateMemory
        );
        assert_eq!(
            DatabaseKind::of("sqlite:file:lms?mode=memory&cache=shared"),
            DatabaseKind::SharedMemory
        );
    }

    #[tokio::test]
    async fn private_memory_database_is_one_database() {
        let storage = Storage::sqlite("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        for course in 1..=3 {
            storage
                .enrollments
                .upsert_enrollment(UserId::new(1), CourseId::new(course), 10.0, now)
                .await
                .unwrap();
        }
        assert_eq!(storage.enrollments.list_enrollments().await.unwrap().len(), 3);
    }
}
