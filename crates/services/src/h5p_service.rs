use std::sync::Arc;

use lms_core::model::UserId;
use serde_json::Value;
use storage::repository::{H5pRecord, H5pRepository, NewH5pRecord, UserRepository};
use tracing::info;

use crate::Clock;
use crate::error::H5pServiceError;

/// Input for [`H5pService::create`].
#[derive(Debug, Clone, Default)]
pub struct NewH5pContent {
    pub title: String,
    pub content_type: String,
    pub content: Option<String>,
    pub parameters: Option<Value>,
    pub tracking: bool,
    pub author_id: Option<UserId>,
}

#[derive(Clone)]
pub struct H5pService {
    clock: Clock,
    h5p: Arc<dyn H5pRepository>,
    users: Arc<dyn UserRepository>,
}

impl H5pService {
    #[must_use]
    pub fn new(clock: Clock, h5p: Arc<dyn H5pRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, h5p, users }
    }

    /// # Errors
    ///
    /// Returns `H5pServiceError::MissingField` when the title or content type
    /// is blank, `H5pServiceError::UnknownAuthor` when `author_id` names no
    /// user and `H5pServiceError::Storage` if persistence fails.
    pub async fn create(&self, input: NewH5pContent) -> Result<H5pRecord, H5pServiceError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(H5pServiceError::MissingField("title"));
        }
        let content_type = input.content_type.trim();
        if content_type.is_empty() {
            return Err(H5pServiceError::MissingField("contentType"));
        }
        if let Some(author) = input.author_id {
            if self.users.get_user(author).await?.is_none() {
                return Err(H5pServiceError::UnknownAuthor(author));
            }
        }
        let record = self
            .h5p
            .insert_h5p(
                NewH5pRecord {
                    title: title.to_owned(),
                    content_type: content_type.to_owned(),
                    content: input.content,
                    parameters: input.parameters.as_ref().map(Value::to_string),
                    tracking: input.tracking,
                    author_id: input.author_id,
                },
                self.clock.now(),
            )
            .await?;
        info!(content_id = %record.id, content_type = %record.content_type, "created H5P content");
        Ok(record)
    }

    /// All content, newest first.
    ///
    /// # Errors
    ///
    /// Returns `H5pServiceError::Storage` if repository access fails.
    pub async fn list(&self) -> Result<Vec<H5pRecord>, H5pServiceError> {
        Ok(self.h5p.list_h5p().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use lms_core::time::fixed_now;
    use serde_json::json;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn requires_title_and_content_type() {
        let repo = Arc::new(InMemoryRepository::new());
        let svc = H5pService::new(Clock::fixed(fixed_now()), repo.clone(), repo);
        let missing_title = NewH5pContent {
            content_type: "H5P.DragText".into(),
            ..NewH5pContent::default()
        };
        assert!(matches!(
            svc.create(missing_title).await,
            Err(H5pServiceError::MissingField("title"))
        ));
        let missing_type = NewH5pContent {
            title: "Drag the words".into(),
            ..NewH5pContent::default()
        };
        assert!(matches!(
            svc.create(missing_type).await,
            Err(H5pServiceError::MissingField("contentType"))
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_author() {
        let repo = Arc::new(InMemoryRepository::new());
        let svc = H5pService::new(Clock::fixed(fixed_now()), repo.clone(), repo);
        let input = NewH5pContent {
            title: "Drag the words".into(),
            content_type: "H5P.DragText".into(),
            author_id: Some(UserId::new(7)),
            ..NewH5pContent::default()
        };
        assert!(matches!(
            svc.create(input).await,
            Err(H5pServiceError::UnknownAuthor(_))
        ));
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stores_parameters_as_json_and_lists_newest_first() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut clock = Clock::fixed(fixed_now());
        for title in ["First", "Second"] {
            H5pService::new(clock, repo.clone(), repo.clone())
                .create(NewH5pContent {
                    title: title.into(),
                    content_type: "H5P.MultiChoice".into(),
                    parameters: Some(json!({"answers": 4})),
                    tracking: true,
                    ..NewH5pContent::default()
                })
                .await
                .unwrap();
            clock.advance(Duration::seconds(1));
        }
        let items = H5pService::new(clock, repo.clone(), repo).list().await.unwrap();
        assert_eq!(items[0].title, "Second");
        let params: Value = serde_json::from_str(items[0].parameters.as_deref().unwrap()).unwrap();
        assert_eq!(params["answers"], 4);
    }
}
