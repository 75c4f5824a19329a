//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{AuthRecord, FeedEntryRecord, PostRecord, TagWithCount, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub is_admin: bool,
}

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostListFilter {
    /// `Some(true)` for published posts, `Some(false)` for drafts, `None` for both.
    pub published: Option<bool>,
    pub author_id: Option<i32>,
}

impl PostListFilter {
    pub fn published() -> Self {
        Self {
            published: Some(true),
            author_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub content_html: String,
    pub slug: String,
    pub published: bool,
    pub author_id: i32,
    pub tags: Vec<String>,
    pub now: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub content_html: String,
    pub slug: String,
    pub published: bool,
    pub tags: Vec<String>,
    pub now: OffsetDateTime,
}

/// Result of an update, carrying the slug the post had before the write.
#[derive(Debug, Clone)]
pub struct UpdatedPost {
    pub post: PostRecord,
    pub previous_slug: String,
}

/// Identity of a removed post, kept for cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPost {
    pub id: Uuid,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub posts: Vec<PostRecord>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct CreateFeedEntryParams {
    pub id: Uuid,
    pub content: String,
    pub author_id: i32,
    pub author_name: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    /// The only lookup that exposes the stored password hash.
    async fn find_by_username(&self, username: &str) -> Result<Option<AuthRecord>, RepoError>;

    async fn set_admin(&self, username: &str, is_admin: bool) -> Result<(), RepoError>;

    async fn update_password_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    /// Newest first by creation time.
    async fn list_posts(
        &self,
        filter: PostListFilter,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn count_posts(&self, filter: PostListFilter) -> Result<u64, RepoError>;

    /// Full-text search over published posts, best match first.
    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        offset: u64,
    ) -> Result<SearchResults, RepoError>;

    async fn slug_exists(&self, slug: &str, excluding: Option<Uuid>) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<UpdatedPost, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<DeletedPost, RepoError>;

    /// Removes every listed post or none of them.
    async fn delete_posts(&self, ids: &[Uuid]) -> Result<Vec<DeletedPost>, RepoError>;
}

#[async_trait]
pub trait FeedRepo: Send + Sync {
    async fn create_entry(
        &self,
        params: CreateFeedEntryParams,
    ) -> Result<FeedEntryRecord, RepoError>;

    async fn list_entries(&self, limit: u32, offset: u64)
    -> Result<Vec<FeedEntryRecord>, RepoError>;

    async fn count_entries(&self) -> Result<u64, RepoError>;

    async fn delete_entry(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<TagWithCount>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
