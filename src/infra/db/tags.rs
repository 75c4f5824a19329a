use async_trait::async_trait;

use crate::application::repos::{RepoError, TagsRepo};
use crate::domain::entities::TagWithCount;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TagCountRow {
    id: i32,
    name: String,
    description: Option<String>,
    published_posts: i64,
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_tags(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, TagCountRow>(
            r#"
            SELECT t.id, t.name, t.description, COUNT(p.id) AS published_posts
            FROM tags t
            LEFT JOIN post_tags pt ON pt.tag_id = t.id
            LEFT JOIN posts p ON p.id = pt.post_id AND p.published
            GROUP BY t.id
            ORDER BY published_posts DESC, t.name
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| TagWithCount {
                id: row.id,
                name: row.name,
                description: row.description,
                published_posts: row.published_posts,
            })
            .collect())
    }
}
