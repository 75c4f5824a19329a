use std::sync::Arc;

use uuid::Uuid;

use crate::application::render::MarkdownRenderer;
use crate::application::repos::{PostsRepo, PostsWriteRepo};
use crate::cache::{ContentCache, POSTS_LIST_PATTERN, POSTS_SEARCH_PATTERN, post_by_id, post_by_slug};

/// Post reads go through the cache; writes go to the store and then
/// invalidate whatever they may have made stale.
#[derive(Clone)]
pub struct PostService {
    pub(crate) reader: Arc<dyn PostsRepo>,
    pub(crate) writer: Arc<dyn PostsWriteRepo>,
    pub(crate) cache: ContentCache,
    pub(crate) renderer: Arc<dyn MarkdownRenderer>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        cache: ContentCache,
        renderer: Arc<dyn MarkdownRenderer>,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            renderer,
        }
    }

    /// Best-effort; the write has already committed when this runs.
    pub(crate) async fn invalidate_posts<'a>(
        &self,
        posts: impl IntoIterator<Item = (Uuid, &'a str)>,
    ) {
        for (id, slug) in posts {
            self.cache.invalidate(&post_by_id(id)).await;
            self.cache.invalidate(&post_by_slug(slug)).await;
        }
        self.cache.invalidate_matching(POSTS_LIST_PATTERN).await;
        self.cache.invalidate_matching(POSTS_SEARCH_PATTERN).await;
    }
}
