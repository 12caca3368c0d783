use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lms_core::model::{
    ContentId, CourseId, InteractionEvent, LessonStatus, Objective, Score, UserId,
};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

/// Enrollment progress is kept with two decimals.
#[must_use]
pub fn round_progress(progress: f64) -> f64 {
    (progress * 100.0).round() / 100.0
}

/// Ledger snapshot to persist for one learner and course.
#[derive(Debug, Clone, PartialEq)]
pub struct ScormSnapshot {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub lesson_status: LessonStatus,
    pub score: Score,
    pub session_time: Duration,
    pub total_time: Duration,
    pub location: String,
    pub suspend_data: String,
    pub interactions: Vec<InteractionEvent>,
    pub objectives: Vec<Objective>,
}

/// Persisted SCORM row. One per (user, course).
#[derive(Debug, Clone, PartialEq)]
pub struct ScormRecord {
    pub id: i64,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub lesson_status: LessonStatus,
    pub score: Score,
    pub session_time: Duration,
    pub total_time: Duration,
    pub location: String,
    pub suspend_data: String,
    pub interactions: Vec<InteractionEvent>,
    pub objectives: Vec<Objective>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub id: i64,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress: f64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Enrollment joined with its course; the course columns are absent when the
/// course row does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseProgressRecord {
    pub course_id: CourseId,
    pub progress: f64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub course_title: Option<String>,
    pub course_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCourseRecord {
    pub title: String,
    pub description: Option<String>,
    /// Course structure as JSON text.
    pub content: Option<String>,
    pub author_id: Option<UserId>,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseRecord {
    pub id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author_id: Option<UserId>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewH5pRecord {
    pub title: String,
    pub content_type: String,
    pub content: Option<String>,
    /// Parameters as JSON text.
    pub parameters: Option<String>,
    pub tracking: bool,
    pub author_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct H5pRecord {
    pub id: ContentId,
    pub title: String,
    pub content_type: String,
    pub content: Option<String>,
    pub parameters: Option<String>,
    pub tracking: bool,
    pub author_id: Option<UserId>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserRecord {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ScormRepository: Send + Sync {
    /// Insert or replace the row for `(user_id, course_id)` in one step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn upsert_scorm(
        &self,
        snapshot: &ScormSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ScormRecord, StorageError>;

    /// Most recently updated rows first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn recent_scorm(&self, limit: u32) -> Result<Vec<ScormRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_scorm(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<ScormRecord>, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert or update progress for `(user_id, course_id)` in one step.
    /// `completed_at` becomes `now` when progress reaches 100, else null.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn upsert_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        progress: f64,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, StorageError>;

    /// Newest enrollment first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgressRecord>, StorageError>;

    /// Newest enrollment first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn list_enrollments(&self) -> Result<Vec<EnrollmentRecord>, StorageError>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn insert_course(
        &self,
        course: NewCourseRecord,
        now: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_course(&self, id: CourseId) -> Result<Option<CourseRecord>, StorageError>;

    /// Ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn list_courses(&self) -> Result<Vec<CourseRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown course.
    async fn set_published(
        &self,
        id: CourseId,
        published: bool,
        now: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError>;
}

#[async_trait]
pub trait H5pRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn insert_h5p(
        &self,
        content: NewH5pRecord,
        now: DateTime<Utc>,
    ) -> Result<H5pRecord, StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn list_h5p(&self) -> Result<Vec<H5pRecord>, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username or email is taken.
    async fn insert_user(
        &self,
        user: NewUserRecord,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Each write holds its table lock for the whole read-modify-write.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    scorm: Arc<Mutex<Vec<ScormRecord>>>,
    enrollments: Arc<Mutex<Vec<EnrollmentRecord>>>,
    courses: Arc<Mutex<Vec<CourseRecord>>>,
    h5p: Arc<Mutex<Vec<H5pRecord>>>,
    users: Arc<Mutex<Vec<UserRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX - 1) + 1
}

#[async_trait]
impl ScormRepository for InMemoryRepository {
    async fn upsert_scorm(
        &self,
        snapshot: &ScormSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ScormRecord, StorageError> {
        let mut rows = lock(&self.scorm)?;
        let existing = rows
            .iter_mut()
            .find(|r| r.user_id == snapshot.user_id && r.course_id == snapshot.course_id);
        let record = match existing {
            Some(row) => {
                row.lesson_status = snapshot.lesson_status;
                row.score = snapshot.score;
                row.session_time = snapshot.session_time;
                row.total_time = snapshot.total_time;
                row.location.clone_from(&snapshot.location);
                row.suspend_data.clone_from(&snapshot.suspend_data);
                row.interactions.clone_from(&snapshot.interactions);
                row.objectives.clone_from(&snapshot.objectives);
                row.updated_at = now;
                row.clone()
            }
            None => {
                let id = i64::try_from(rows.len()).unwrap_or(i64::MAX - 1) + 1;
                let row = ScormRecord {
                    id,
                    user_id: snapshot.user_id,
                    course_id: snapshot.course_id,
                    lesson_status: snapshot.lesson_status,
                    score: snapshot.score,
                    session_time: snapshot.session_time,
                    total_time: snapshot.total_time,
                    location: snapshot.location.clone(),
                    suspend_data: snapshot.suspend_data.clone(),
                    interactions: snapshot.interactions.clone(),
                    objectives: snapshot.objectives.clone(),
                    created_at: now,
                    updated_at: now,
                };
                rows.push(row.clone());
                row
            }
        };
        Ok(record)
    }

    async fn recent_scorm(&self, limit: u32) -> Result<Vec<ScormRecord>, StorageError> {
        let rows = lock(&self.scorm)?;
        let mut out = rows.clone();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }

    async fn get_scorm(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<ScormRecord>, StorageError> {
        let rows = lock(&self.scorm)?;
        Ok(rows
            .iter()
            .find(|r| r.user_id == user_id && r.course_id == course_id)
            .cloned())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn upsert_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        progress: f64,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, StorageError> {
        let progress = round_progress(progress);
        let completed_at = (progress >= 100.0).then_some(now);
        let mut rows = lock(&self.enrollments)?;
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.user_id == user_id && r.course_id == course_id)
        {
            row.progress = progress;
            row.completed_at = completed_at;
            return Ok(row.clone());
        }
        let row = EnrollmentRecord {
            id: i64::try_from(rows.len()).unwrap_or(i64::MAX - 1) + 1,
            user_id,
            course_id,
            progress,
            enrolled_at: now,
            completed_at,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgressRecord>, StorageError> {
        let mut mine: Vec<EnrollmentRecord> = lock(&self.enrollments)?
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at).then(b.id.cmp(&a.id)));

        let courses = lock(&self.courses)?;
        Ok(mine
            .into_iter()
            .map(|e| {
                let course = courses.iter().find(|c| c.id == e.course_id);
                CourseProgressRecord {
                    course_id: e.course_id,
                    progress: e.progress,
                    enrolled_at: e.enrolled_at,
                    completed_at: e.completed_at,
                    course_title: course.map(|c| c.title.clone()),
                    course_description: course.and_then(|c| c.description.clone()),
                }
            })
            .collect())
    }

    async fn list_enrollments(&self) -> Result<Vec<EnrollmentRecord>, StorageError> {
        let mut rows = lock(&self.enrollments)?.clone();
        rows.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_course(
        &self,
        course: NewCourseRecord,
        now: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError> {
        let mut rows = lock(&self.courses)?;
        let record = CourseRecord {
            id: CourseId::new(next_id(rows.len())),
            title: course.title,
            description: course.description,
            content: course.content,
            author_id: course.author_id,
            published: course.published,
            created_at: now,
            updated_at: now,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<CourseRecord>, StorageError> {
        Ok(lock(&self.courses)?.iter().find(|c| c.id == id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<CourseRecord>, StorageError> {
        Ok(lock(&self.courses)?.clone())
    }

    async fn set_published(
        &self,
        id: CourseId,
        published: bool,
        now: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError> {
        let mut rows = lock(&self.courses)?;
        let row = rows
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StorageError::NotFound)?;
        row.published = published;
        row.updated_at = now;
        Ok(row.clone())
    }
}

#[async_trait]
impl H5pRepository for InMemoryRepository {
    async fn insert_h5p(
        &self,
        content: NewH5pRecord,
        now: DateTime<Utc>,
    ) -> Result<H5pRecord, StorageError> {
        let mut rows = lock(&self.h5p)?;
        let record = H5pRecord {
            id: ContentId::new(next_id(rows.len())),
            title: content.title,
            content_type: content.content_type,
            content: content.content,
            parameters: content.parameters,
            tracking: content.tracking,
            author_id: content.author_id,
            published: false,
            created_at: now,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn list_h5p(&self) -> Result<Vec<H5pRecord>, StorageError> {
        let mut rows = lock(&self.h5p)?.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(
        &self,
        user: NewUserRecord,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, StorageError> {
        let mut rows = lock(&self.users)?;
        if rows
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StorageError::Conflict);
        }
        let record = UserRecord {
            id: UserId::new(next_id(rows.len())),
            username: user.username,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: now,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        Ok(lock(&self.users)?.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        Ok(lock(&self.users)?
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub scorm: Arc<dyn ScormRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub h5p: Arc<dyn H5pRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self::from_repo(repo)
    }

    pub(crate) fn from_repo<R>(repo: R) -> Self
    where
        R: ScormRepository
            + EnrollmentRepository
            + CourseRepository
            + H5pRepository
            + UserRepository
            + Clone
            + 'static,
    {
        Self {
            scorm: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            courses: Arc::new(repo.clone()),
            h5p: Arc::new(repo.clone()),
            users: Arc::new(repo),
        }
    }
}
