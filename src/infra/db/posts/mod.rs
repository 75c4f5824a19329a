mod read;
mod types;
mod write;

use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{PostListFilter, RepoError};
use crate::domain::entities::PostRecord;

use super::{PostgresRepositories, map_sqlx_error};
use types::PostRow;

/// Post columns plus the aggregated tag names; callers append conditions and `GROUP BY p.id`.
const SELECT_POSTS: &str = "SELECT p.id, p.title, p.content, p.content_html, p.slug, \
     p.published, p.published_at, p.author_id, p.created_at, p.updated_at, \
     COALESCE(array_agg(t.name::text ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL), '{}'::text[]) AS tags \
     FROM posts p \
     LEFT JOIN post_tags pt ON pt.post_id = p.id \
     LEFT JOIN tags t ON t.id = pt.tag_id \
     WHERE 1=1";

const SEARCH_DOCUMENT: &str = "to_tsvector('english', p.title || ' ' || p.content)";

impl PostgresRepositories {
    fn apply_list_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: PostListFilter) {
        if let Some(published) = filter.published {
            qb.push(" AND p.published = ");
            qb.push_bind(published);
        }
        if let Some(author_id) = filter.author_id {
            qb.push(" AND p.author_id = ");
            qb.push_bind(author_id);
        }
    }

    fn apply_search_match<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &'q str) {
        qb.push(" AND p.published = TRUE AND ");
        qb.push(SEARCH_DOCUMENT);
        qb.push(" @@ plainto_tsquery('english', ");
        qb.push_bind(query);
        qb.push(")");
    }
}

async fn fetch_post<'e, E>(executor: E, id: Uuid) -> Result<Option<PostRecord>, RepoError>
where
    E: PgExecutor<'e>,
{
    let mut qb = QueryBuilder::new(SELECT_POSTS);
    qb.push(" AND p.id = ");
    qb.push_bind(id);
    qb.push(" GROUP BY p.id");

    let row = qb
        .build_query_as::<PostRow>()
        .fetch_optional(executor)
        .await
        .map_err(map_sqlx_error)?;
    Ok(row.map(PostRecord::from))
}
