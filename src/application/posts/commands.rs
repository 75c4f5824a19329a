use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, DeletedPost, UpdatePostParams};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugAsyncError, SlugError, unique_slug};

use super::service::PostService;
use super::types::{
    CreatePostCommand, PostError, UpdatePostCommand, normalize_explicit_slug, normalize_tags,
    normalize_title,
};

const LOG_TARGET: &str = "qubit::posts";

impl PostService {
    pub async fn create_post(
        &self,
        author_id: i32,
        command: CreatePostCommand,
    ) -> Result<PostRecord, PostError> {
        let title = normalize_title(&command.title)?;
        let tags = normalize_tags(command.tags)?;
        let slug = match normalize_explicit_slug(command.slug.as_deref())? {
            Some(slug) => slug,
            None => self.derive_slug(&title, None).await?,
        };
        let content_html = self.renderer.render(&command.content);

        let post = self
            .writer
            .create_post(CreatePostParams {
                id: Uuid::new_v4(),
                title,
                content: command.content,
                content_html,
                slug,
                published: command.published,
                author_id,
                tags,
                now: OffsetDateTime::now_utc(),
            })
            .await?;

        self.invalidate_posts([(post.id, post.slug.as_str())]).await;
        info!(
            target: LOG_TARGET,
            post_id = %post.id,
            slug = %post.slug,
            published = post.published,
            "Created post"
        );
        Ok(post)
    }

    pub async fn update_post(&self, command: UpdatePostCommand) -> Result<PostRecord, PostError> {
        let title = normalize_title(&command.title)?;
        let tags = normalize_tags(command.tags)?;
        let slug = match normalize_explicit_slug(command.slug.as_deref())? {
            Some(slug) => slug,
            None => self.derive_slug(&title, Some(command.id)).await?,
        };
        let content_html = self.renderer.render(&command.content);

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: command.id,
                title,
                content: command.content,
                content_html,
                slug,
                published: command.published,
                tags,
                now: OffsetDateTime::now_utc(),
            })
            .await?;

        let post = updated.post;
        self.invalidate_posts([
            (post.id, updated.previous_slug.as_str()),
            (post.id, post.slug.as_str()),
        ])
        .await;
        info!(
            target: LOG_TARGET,
            post_id = %post.id,
            slug = %post.slug,
            previous_slug = %updated.previous_slug,
            published = post.published,
            "Updated post"
        );
        Ok(post)
    }

    pub async fn delete_post(&self, id: Uuid) -> Result<(), PostError> {
        let deleted = self.writer.delete_post(id).await?;
        self.invalidate_posts([(deleted.id, deleted.slug.as_str())])
            .await;
        info!(target: LOG_TARGET, post_id = %id, "Deleted post");
        Ok(())
    }

    /// Delete all of `ids` or, if any is missing, none of them.
    pub async fn delete_posts(&self, ids: &[Uuid]) -> Result<Vec<DeletedPost>, PostError> {
        let mut unique: Vec<Uuid> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.is_empty() {
            return Err(DomainError::validation("ids", "at least one post id is required").into());
        }

        let deleted = self.writer.delete_posts(&unique).await?;
        let keys: Vec<(Uuid, &str)> = deleted
            .iter()
            .map(|post| (post.id, post.slug.as_str()))
            .collect();
        self.invalidate_posts(keys).await;
        info!(target: LOG_TARGET, count = deleted.len(), "Bulk deleted posts");
        Ok(deleted)
    }

    async fn derive_slug(&self, title: &str, owner: Option<Uuid>) -> Result<String, PostError> {
        let reader = self.reader.clone();
        let result = unique_slug(title, move |candidate| {
            let reader = reader.clone();
            async move {
                reader
                    .slug_exists(&candidate, owner)
                    .await
                    .map(|exists| !exists)
            }
        })
        .await;

        match result {
            Ok(slug) => Ok(slug),
            Err(SlugAsyncError::Slug(SlugError::EmptyInput | SlugError::Unrepresentable { .. })) => {
                Err(DomainError::validation("title", "cannot derive a slug from this title").into())
            }
            Err(SlugAsyncError::Slug(SlugError::Exhausted { .. })) => Err(PostError::SlugTaken),
            Err(SlugAsyncError::Predicate(err)) => Err(err.into()),
        }
    }
}
