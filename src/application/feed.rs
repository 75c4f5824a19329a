//! Short-form feed entries.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::auth::Identity;
use crate::application::pagination::{DEFAULT_FEED_PAGE_SIZE, MAX_PAGE_SIZE, Paged};
use crate::application::repos::{CreateFeedEntryParams, FeedRepo, RepoError};
use crate::domain::entities::FeedEntryRecord;
use crate::domain::error::DomainError;

const MAX_CONTENT_LENGTH: usize = 10_000;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("feed entry not found")]
    NotFound,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for FeedError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            other => Self::Repo(other),
        }
    }
}

/// Limit/offset window over the feed, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedWindow {
    pub limit: u32,
    pub offset: u64,
}

impl FeedWindow {
    pub fn new(limit: u32, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }
}

impl Default for FeedWindow {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_PAGE_SIZE, 0)
    }
}

#[derive(Clone)]
pub struct FeedService {
    repo: Arc<dyn FeedRepo>,
}

impl FeedService {
    pub fn new(repo: Arc<dyn FeedRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, window: FeedWindow) -> Result<Paged<FeedEntryRecord>, FeedError> {
        let items = self.repo.list_entries(window.limit, window.offset).await?;
        let total = self.repo.count_entries().await?;
        Ok(Paged { items, total })
    }

    /// Publish an entry under the author's current username.
    pub async fn create(
        &self,
        author: &Identity,
        content: &str,
    ) -> Result<FeedEntryRecord, FeedError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("content", "must not be empty").into());
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(DomainError::validation(
                "content",
                format!("must be at most {MAX_CONTENT_LENGTH} characters"),
            )
            .into());
        }

        let entry = self
            .repo
            .create_entry(CreateFeedEntryParams {
                id: Uuid::new_v4(),
                content: content.to_string(),
                author_id: author.user.id,
                author_name: author.user.username.clone(),
            })
            .await?;
        info!(
            target: "qubit::feed",
            entry_id = %entry.id,
            author = %entry.author_name,
            "Created feed entry"
        );
        Ok(entry)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), FeedError> {
        self.repo.delete_entry(id).await?;
        info!(target: "qubit::feed", entry_id = %id, "Deleted feed entry");
        Ok(())
    }
}
