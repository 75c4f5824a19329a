//! Offset pagination shared by post listings and the feed.

use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_POST_PAGE_SIZE: u32 = 10;
pub const DEFAULT_FEED_PAGE_SIZE: u32 = 20;

/// A 1-based page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Clamps `page` to at least 1 and `limit` to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_POST_PAGE_SIZE)
    }
}

/// A page of items together with the unpaged total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Paged<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn total_pages(&self, limit: u32) -> u64 {
        self.total.div_ceil(u64::from(limit.max(1)))
    }
}
