use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::validation::check_length;

pub(crate) const MAX_TITLE_LENGTH: usize = 255;
pub(crate) const MAX_SLUG_LENGTH: usize = 255;
pub(crate) const MAX_TAG_LENGTH: usize = 50;

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("post not found")]
    NotFound,
    #[error("slug is already in use")]
    SlugTaken,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for PostError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            RepoError::Duplicate { .. } => Self::SlugTaken,
            other => Self::Repo(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: String,
    pub content: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub published: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: Option<String>,
    pub published: bool,
    pub tags: Vec<String>,
}

/// Trim, drop blanks, and de-duplicate tag names, keeping first occurrence order.
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, DomainError> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || normalized.iter().any(|existing| existing == tag) {
            continue;
        }
        check_length("tags", tag, 1, MAX_TAG_LENGTH)?;
        normalized.push(tag.to_string());
    }
    Ok(normalized)
}

pub(crate) fn normalize_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    check_length("title", title, 1, MAX_TITLE_LENGTH)?;
    Ok(title.to_string())
}

pub(crate) fn normalize_explicit_slug(slug: Option<&str>) -> Result<Option<String>, DomainError> {
    match slug.map(str::trim) {
        None | Some("") => Ok(None),
        Some(slug) => {
            check_length("slug", slug, 1, MAX_SLUG_LENGTH)?;
            Ok(Some(slug.to_string()))
        }
    }
}
