//! API handlers grouped by resource.

mod auth;
mod feed;
mod posts;
mod tags;

pub use auth::*;
pub use feed::*;
pub use posts::*;
pub use tags::*;

// ----- Shared query structs -----

use serde::Deserialize;

use crate::application::feed::FeedWindow;
use crate::application::pagination::{
    DEFAULT_FEED_PAGE_SIZE, DEFAULT_POST_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest,
};
use crate::domain::error::DomainError;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_post_limit")]
    pub limit: u32,
}

impl PageQuery {
    pub fn to_request(&self) -> Result<PageRequest, ApiError> {
        page_request(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_post_limit")]
    pub limit: u32,
}

impl SearchQuery {
    pub fn to_request(&self) -> Result<PageRequest, ApiError> {
        page_request(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default = "default_feed_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u64,
}

impl WindowQuery {
    pub fn to_window(&self) -> Result<FeedWindow, ApiError> {
        check_limit(self.limit)?;
        Ok(FeedWindow::new(self.limit, self.offset))
    }
}

fn page_request(page: u32, limit: u32) -> Result<PageRequest, ApiError> {
    if page == 0 {
        return Err(DomainError::validation("page", "must be at least 1").into());
    }
    check_limit(limit)?;
    Ok(PageRequest::new(page, limit))
}

fn check_limit(limit: u32) -> Result<(), ApiError> {
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(DomainError::validation(
            "limit",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        )
        .into());
    }
    Ok(())
}

fn first_page() -> u32 {
    1
}

fn default_post_limit() -> u32 {
    DEFAULT_POST_PAGE_SIZE
}

fn default_feed_limit() -> u32 {
    DEFAULT_FEED_PAGE_SIZE
}
