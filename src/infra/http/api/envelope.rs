//! Uniform `{success, data?, error?, meta?}` response body.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::error::ApiErrorMessage;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T = (), M = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
        }
    }
}

impl ApiResponse {
    pub fn failure(error: ApiErrorMessage) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            meta: None,
        }
    }
}

impl<T, M> ApiResponse<T, M> {
    pub fn with_meta<N>(self, meta: N) -> ApiResponse<T, N> {
        ApiResponse {
            success: self.success,
            data: self.data,
            error: self.error,
            meta: Some(meta),
        }
    }
}

impl<T: Serialize, M: Serialize> IntoResponse for ApiResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Offset-window metadata for the feed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WindowMeta {
    pub limit: u32,
    pub offset: u64,
    pub total: u64,
}

/// Page-number metadata for post listings.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub total_pages: u64,
    pub total: u64,
}
