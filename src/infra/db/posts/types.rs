use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostRecord;
use crate::domain::posts::PublicationState;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub content_html: String,
    pub slug: String,
    pub published: bool,
    pub published_at: Option<OffsetDateTime>,
    pub author_id: i32,
    pub tags: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        PostRecord {
            id: row.id,
            title: row.title,
            content: row.content,
            content_html: row.content_html,
            slug: row.slug,
            published: row.published,
            published_at: row.published_at,
            author_id: row.author_id,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row locked at the start of an update.
#[derive(sqlx::FromRow)]
pub(crate) struct CurrentPostRow {
    pub slug: String,
    pub published: bool,
    pub published_at: Option<OffsetDateTime>,
}

impl CurrentPostRow {
    pub fn publication(&self) -> PublicationState {
        PublicationState {
            published: self.published,
            published_at: self.published_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DeletedPostRow {
    pub id: Uuid,
    pub slug: String,
}
