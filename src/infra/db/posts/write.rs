use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, DeletedPost, PostsWriteRepo, RepoError, UpdatePostParams, UpdatedPost,
};
use crate::domain::entities::PostRecord;
use crate::domain::posts::next_published_at;

use super::types::{CurrentPostRow, DeletedPostRow};
use super::{PostgresRepositories, fetch_post};
use crate::infra::db::map_sqlx_error;

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let published_at = next_published_at(None, params.published, params.now);

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, content_html, slug, published, published_at, author_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.content)
        .bind(&params.content_html)
        .bind(&params.slug)
        .bind(params.published)
        .bind(published_at)
        .bind(params.author_id)
        .bind(params.now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        replace_tags(&mut tx, params.id, &params.tags).await?;
        let post = fetch_post(&mut *tx, params.id)
            .await?
            .ok_or_else(|| RepoError::Integrity {
                message: "inserted post is not visible inside its transaction".to_string(),
            })?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<UpdatedPost, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let current = sqlx::query_as::<_, CurrentPostRow>(
            "SELECT slug, published, published_at FROM posts WHERE id = $1 FOR UPDATE",
        )
        .bind(params.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let published_at =
            next_published_at(Some(current.publication()), params.published, params.now);

        sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, content = $3, content_html = $4, slug = $5,
                published = $6, published_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.content)
        .bind(&params.content_html)
        .bind(&params.slug)
        .bind(params.published)
        .bind(published_at)
        .bind(params.now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        replace_tags(&mut tx, params.id, &params.tags).await?;
        let post = fetch_post(&mut *tx, params.id)
            .await?
            .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(UpdatedPost {
            post,
            previous_slug: current.slug,
        })
    }

    async fn delete_post(&self, id: Uuid) -> Result<DeletedPost, RepoError> {
        let row = sqlx::query_as::<_, DeletedPostRow>(
            "DELETE FROM posts WHERE id = $1 RETURNING id, slug",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(DeletedPost {
            id: row.id,
            slug: row.slug,
        })
    }

    async fn delete_posts(&self, ids: &[Uuid]) -> Result<Vec<DeletedPost>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, DeletedPostRow>(
            "DELETE FROM posts WHERE id = ANY($1) RETURNING id, slug",
        )
        .bind(ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if rows.len() != ids.len() {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(rows
            .into_iter()
            .map(|row| DeletedPost {
                id: row.id,
                slug: row.slug,
            })
            .collect())
    }
}

/// Upsert each tag by name and relink the post to exactly that set.
async fn replace_tags(
    conn: &mut PgConnection,
    post_id: Uuid,
    tags: &[String],
) -> Result<(), RepoError> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    for name in tags {
        let tag_id: i32 = sqlx::query_scalar(
            "INSERT INTO tags (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    }

    Ok(())
}
