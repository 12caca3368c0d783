use std::sync::Arc;

use lms_core::builder::{BuilderError, Course, CourseBuilder, CourseExport};
use lms_core::model::{CourseId, UserId};
use storage::repository::{
    CourseRecord, CourseRepository, NewCourseRecord, StorageError, UserRepository,
};
use tracing::info;

use crate::Clock;
use crate::error::CourseServiceError;

/// Course catalogue. Authored courses are stored as builder exports.
#[derive(Clone)]
pub struct CourseService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    users: Arc<dyn UserRepository>,
}

impl CourseService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            users,
        }
    }

    /// Persist an authored course. The row's `content` holds the export JSON.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::EmptyTitle` for a blank title,
    /// `CourseServiceError::UnknownAuthor` when `author_id` names no user,
    /// `CourseServiceError::Builder` if the export cannot be serialized and
    /// `CourseServiceError::Storage` if persistence fails.
    pub async fn create(
        &self,
        course: Course,
        author_id: Option<UserId>,
        published: bool,
    ) -> Result<CourseRecord, CourseServiceError> {
        let title = course.title.trim().to_owned();
        if title.is_empty() {
            return Err(CourseServiceError::EmptyTitle);
        }
        if let Some(author) = author_id {
            if self.users.get_user(author).await?.is_none() {
                return Err(CourseServiceError::UnknownAuthor(author));
            }
        }
        let description = Some(course.description.trim().to_owned()).filter(|d| !d.is_empty());
        let builder = CourseBuilder::new(course);
        let content = builder.export_json(self.clock.now())?;

        let record = self
            .courses
            .insert_course(
                NewCourseRecord {
                    title,
                    description,
                    content: Some(content),
                    author_id,
                    published,
                },
                self.clock.now(),
            )
            .await?;
        info!(
            course_id = %record.id,
            modules = builder.modules().len(),
            "created course"
        );
        Ok(record)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn list(&self) -> Result<Vec<CourseRecord>, CourseServiceError> {
        Ok(self.courses.list_courses().await?)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` for an unknown id and
    /// `CourseServiceError::Storage` if repository access fails.
    pub async fn get(&self, id: CourseId) -> Result<CourseRecord, CourseServiceError> {
        self.courses
            .get_course(id)
            .await?
            .ok_or(CourseServiceError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` for an unknown id and
    /// `CourseServiceError::Storage` if persistence fails.
    pub async fn set_published(
        &self,
        id: CourseId,
        published: bool,
    ) -> Result<CourseRecord, CourseServiceError> {
        let record = self
            .courses
            .set_published(id, published, self.clock.now())
            .await
            .map_err(|e| match e {
                StorageError::NotFound => CourseServiceError::NotFound,
                other => CourseServiceError::Storage(other),
            })?;
        info!(course_id = %id, published, "course visibility changed");
        Ok(record)
    }

    /// Reopen a stored course in the builder.
    ///
    /// Rows without builder content start as an empty course carrying the
    /// row's title and description.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` for an unknown id,
    /// `CourseServiceError::Builder` when the stored content is not a course
    /// export and `CourseServiceError::Storage` if repository access fails.
    pub async fn builder_for(&self, id: CourseId) -> Result<CourseBuilder, CourseServiceError> {
        let record = self.get(id).await?;
        let course = match record.content.as_deref() {
            Some(raw) => {
                serde_json::from_str::<CourseExport>(raw)
                    .map_err(BuilderError::from)?
                    .course
            }
            None => Course {
                id: id.to_string(),
                title: record.title,
                description: record.description.unwrap_or_default(),
                category: String::new(),
                modules: Vec::new(),
            },
        };
        Ok(CourseBuilder::new(course))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lms_core::builder::ModuleKind;
    use lms_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, NewUserRecord};

    fn service() -> CourseService {
        let repo = Arc::new(InMemoryRepository::new());
        CourseService::new(Clock::fixed(fixed_now()), repo.clone(), repo)
    }

    fn draft(title: &str) -> Course {
        let mut builder = CourseBuilder::new(Course {
            id: "draft".into(),
            title: title.into(),
            description: "Workplace rights".into(),
            category: "law".into(),
            modules: Vec::new(),
        });
        builder.add_module(ModuleKind::Video);
        builder.add_module(ModuleKind::Quiz);
        builder.course().clone()
    }

    #[tokio::test]
    async fn create_then_reopen_in_builder() {
        let svc = service();
        let record = svc
            .create(draft("  Labour Law "), None, false)
            .await
            .unwrap();
        assert_eq!(record.title, "Labour Law");
        assert_eq!(record.description.as_deref(), Some("Workplace rights"));

        let builder = svc.builder_for(record.id).await.unwrap();
        assert_eq!(builder.modules().len(), 2);
        assert_eq!(builder.modules()[1].kind, ModuleKind::Quiz);
        assert_eq!(builder.course().category, "law");
    }

    #[tokio::test]
    async fn rejects_blank_title_and_unknown_ids() {
        let svc = service();
        assert!(matches!(
            svc.create(draft("   "), None, false).await,
            Err(CourseServiceError::EmptyTitle)
        ));
        assert!(matches!(
            svc.get(CourseId::new(9)).await,
            Err(CourseServiceError::NotFound)
        ));
        assert!(matches!(
            svc.set_published(CourseId::new(9), true).await,
            Err(CourseServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn author_must_exist() {
        let repo = Arc::new(InMemoryRepository::new());
        let svc = CourseService::new(Clock::fixed(fixed_now()), repo.clone(), repo.clone());
        assert!(matches!(
            svc.create(draft("Contracts"), Some(UserId::new(42)), false).await,
            Err(CourseServiceError::UnknownAuthor(id)) if id == UserId::new(42)
        ));
        assert!(svc.list().await.unwrap().is_empty());

        let author = repo
            .insert_user(
                NewUserRecord {
                    username: "teacher".into(),
                    password_hash: "!".into(),
                    name: "Teacher".into(),
                    email: "teacher@example.com".into(),
                    role: "instructor".into(),
                },
                fixed_now(),
            )
            .await
            .unwrap();
        let record = svc
            .create(draft("Contracts"), Some(author.id), false)
            .await
            .unwrap();
        assert_eq!(record.author_id, Some(author.id));
    }

    #[tokio::test]
    async fn publish_toggles_visibility() {
        let svc = service();
        let record = svc.create(draft("Contracts"), None, false).await.unwrap();
        let published = svc.set_published(record.id, true).await.unwrap();
        assert!(published.published);
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }
}
