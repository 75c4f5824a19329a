use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::application::repos::{PostListFilter, PostsRepo, RepoError, SearchResults};
use crate::domain::entities::PostRecord;

use super::types::PostRow;
use super::{PostgresRepositories, SEARCH_DOCUMENT, SELECT_POSTS, fetch_post};
use crate::infra::db::map_sqlx_error;

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(SELECT_POSTS);
        qb.push(" AND p.slug = ");
        qb.push_bind(slug);
        qb.push(" GROUP BY p.id");

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PostRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        fetch_post(self.pool(), id).await
    }

    async fn list_posts(
        &self,
        filter: PostListFilter,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(SELECT_POSTS);
        Self::apply_list_filter(&mut qb, filter);
        qb.push(" GROUP BY p.id ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(limit.clamp(1, 100)));
        qb.push(" OFFSET ");
        qb.push_bind(Self::convert_offset(offset)?);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn count_posts(&self, filter: PostListFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1");
        Self::apply_list_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        offset: u64,
    ) -> Result<SearchResults, RepoError> {
        let mut qb = QueryBuilder::new(SELECT_POSTS);
        Self::apply_search_match(&mut qb, query);
        qb.push(" GROUP BY p.id ORDER BY ts_rank(");
        qb.push(SEARCH_DOCUMENT);
        qb.push(", plainto_tsquery('english', ");
        qb.push_bind(query);
        qb.push(")) DESC, p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(limit.clamp(1, 100)));
        qb.push(" OFFSET ");
        qb.push_bind(Self::convert_offset(offset)?);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1");
        Self::apply_search_match(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(SearchResults {
            posts: rows.into_iter().map(PostRecord::from).collect(),
            total: Self::convert_count(total)?,
        })
    }

    async fn slug_exists(&self, slug: &str, excluding: Option<Uuid>) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(excluding)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
