//! Posts handlers

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::auth::Identity;
use crate::application::pagination::{PageRequest, Paged};
use crate::application::posts::{CreatePostCommand, UpdatePostCommand};
use crate::application::repos::PostListFilter;
use crate::domain::entities::PostRecord;
use crate::infra::http::AppState;
use crate::infra::http::api::envelope::{ApiResponse, PageMeta};
use crate::infra::http::api::error::ApiError;

use super::{PageQuery, SearchQuery};

#[derive(Debug, Deserialize)]
pub struct PostWriteRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A page of posts plus the same posts bucketed by year.
#[derive(Debug, Serialize)]
pub struct PostListing {
    pub posts: Vec<PostRecord>,
    pub years: BTreeMap<i32, Vec<PostRecord>>,
}

impl PostListing {
    fn from_page(page: Paged<PostRecord>, request: PageRequest) -> ApiResponse<Self, PageMeta> {
        let meta = PageMeta {
            page: request.page(),
            total_pages: page.total_pages(request.limit()),
            total: page.total,
        };
        let listing = Self {
            years: group_by_year(&page.items),
            posts: page.items,
        };
        ApiResponse::ok(listing).with_meta(meta)
    }
}

/// Bucket posts by publication year, falling back to creation year for drafts.
pub fn group_by_year(posts: &[PostRecord]) -> BTreeMap<i32, Vec<PostRecord>> {
    let mut years: BTreeMap<i32, Vec<PostRecord>> = BTreeMap::new();
    for post in posts {
        let year = post.published_at.unwrap_or(post.created_at).year();
        years.entry(year).or_default().push(post.clone());
    }
    years
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.to_request()?;
    let page = state
        .posts
        .list(PostListFilter::published(), request)
        .await?;
    Ok(PostListing::from_page(page, request))
}

pub async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.to_request()?;
    let page = state.posts.search(&query.q, request).await?;
    Ok(PostListing::from_page(page, request))
}

/// Published post by slug. Drafts are indistinguishable from missing posts.
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.posts.get_by_slug(&slug).await? {
        Some(post) if post.published => Ok(ApiResponse::ok(post)),
        _ => Err(ApiError::not_found("Post not found")),
    }
}

/// Any post by id, drafts included, for the editor.
pub async fn get_post_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.posts.get_by_id(id).await? {
        Some(post) => Ok(ApiResponse::ok(post)),
        None => Err(ApiError::not_found("Post not found")),
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<PostWriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreatePostCommand {
        title: payload.title,
        content: payload.content,
        slug: payload.slug,
        published: payload.published,
        tags: payload.tags,
    };

    let post = state.posts.create_post(identity.user.id, command).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostWriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdatePostCommand {
        id,
        title: payload.title,
        content: payload.content,
        slug: payload.slug,
        published: payload.published,
        tags: payload.tags,
    };

    let post = state.posts.update_post(command).await?;
    Ok(ApiResponse::ok(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.posts.delete_post(id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "id": id })))
}

pub async fn bulk_delete_posts(
    State(state): State<AppState>,
    Json(ids): Json<Vec<Uuid>>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.posts.delete_posts(&ids).await?;
    let ids: Vec<Uuid> = deleted.into_iter().map(|post| post.id).collect();
    Ok(ApiResponse::ok(serde_json::json!({ "deleted": ids })))
}
