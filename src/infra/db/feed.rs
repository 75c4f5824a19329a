use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateFeedEntryParams, FeedRepo, RepoError};
use crate::domain::entities::FeedEntryRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FeedEntryRow {
    id: Uuid,
    content: String,
    author_id: i32,
    author_name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<FeedEntryRow> for FeedEntryRecord {
    fn from(row: FeedEntryRow) -> Self {
        FeedEntryRecord {
            id: row.id,
            content: row.content,
            author_id: row.author_id,
            author_name: row.author_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl FeedRepo for PostgresRepositories {
    async fn create_entry(
        &self,
        params: CreateFeedEntryParams,
    ) -> Result<FeedEntryRecord, RepoError> {
        let row = sqlx::query_as::<_, FeedEntryRow>(
            r#"
            INSERT INTO feed_posts (id, content, author_id, author_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, content, author_id, author_name, created_at, updated_at
            "#,
        )
        .bind(params.id)
        .bind(&params.content)
        .bind(params.author_id)
        .bind(&params.author_name)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn list_entries(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<FeedEntryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedEntryRow>(
            r#"
            SELECT id, content, author_id, author_name, created_at, updated_at
            FROM feed_posts
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(limit.clamp(1, 100)))
        .bind(Self::convert_offset(offset)?)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FeedEntryRecord::from).collect())
    }

    async fn count_entries(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_posts")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn delete_entry(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM feed_posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
