//! Feed handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::auth::Identity;
use crate::infra::http::AppState;
use crate::infra::http::api::envelope::{ApiResponse, WindowMeta};
use crate::infra::http::api::error::ApiError;

use super::WindowQuery;

#[derive(Debug, Deserialize)]
pub struct FeedCreateRequest {
    pub content: String,
}

pub async fn list_feed(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window = query.to_window()?;
    let page = state.feed.list(window).await?;

    let meta = WindowMeta {
        limit: window.limit,
        offset: window.offset,
        total: page.total,
    };
    Ok(ApiResponse::ok(page.items).with_meta(meta))
}

pub async fn create_feed_entry(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<FeedCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.feed.create(&identity, &payload.content).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(entry)))
}

pub async fn delete_feed_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.feed.delete(id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "id": id })))
}
