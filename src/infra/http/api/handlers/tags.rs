//! Tags handlers

use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::AppState;
use crate::infra::http::api::envelope::ApiResponse;
use crate::infra::http::api::error::ApiError;

/// Every tag with the number of published posts carrying it.
pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tags = state.tags.list_tags().await?;
    Ok(ApiResponse::ok(tags))
}
