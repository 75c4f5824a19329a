use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paged};
use crate::application::repos::{PostListFilter, RepoError};
use crate::cache::{post_by_id, post_by_slug, posts_list, posts_search};
use crate::domain::entities::PostRecord;
use crate::domain::validation::check_length;

use super::service::PostService;
use super::types::PostError;

pub const MIN_SEARCH_LENGTH: usize = 3;
pub const MAX_SEARCH_LENGTH: usize = 50;
pub const MAX_LOOKUP_SLUG_LENGTH: usize = 100;

impl PostService {
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, PostError> {
        check_length("slug", slug, 1, MAX_LOOKUP_SLUG_LENGTH)?;
        let post = self
            .cache
            .read_through(&post_by_slug(slug), || self.reader.find_by_slug(slug))
            .await?;
        Ok(post)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, PostError> {
        let post = self
            .cache
            .read_through(&post_by_id(id), || self.reader.find_by_id(id))
            .await?;
        Ok(post)
    }

    /// Newest first. The total counts every post the filter matches.
    pub async fn list(
        &self,
        filter: PostListFilter,
        page: PageRequest,
    ) -> Result<Paged<PostRecord>, PostError> {
        let listing = self
            .cache
            .read_through(&posts_list(filter, page), || async {
                let items = self
                    .reader
                    .list_posts(filter, page.limit(), page.offset())
                    .await?;
                let total = self.reader.count_posts(filter).await?;
                Ok::<_, RepoError>(Some(Paged { items, total }))
            })
            .await?;
        Ok(listing.unwrap_or_else(Paged::empty))
    }

    /// Full-text search over published posts, best match first.
    pub async fn search(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Paged<PostRecord>, PostError> {
        let query = query.trim();
        check_length("q", query, MIN_SEARCH_LENGTH, MAX_SEARCH_LENGTH)?;

        let results = self
            .cache
            .read_through(&posts_search(query, page), || async {
                let results = self
                    .reader
                    .search_posts(query, page.limit(), page.offset())
                    .await?;
                Ok::<_, RepoError>(Some(Paged {
                    items: results.posts,
                    total: results.total,
                }))
            })
            .await?;
        Ok(results.unwrap_or_else(Paged::empty))
    }
}
