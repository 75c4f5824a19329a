use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::auth::CredentialError;
use crate::application::error::{AppError, ErrorReport};
use crate::application::feed::FeedError;
use crate::application::posts::PostError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

use super::envelope::ApiResponse;

pub mod codes {
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const VALIDATION: &str = "validation_error";
    pub const UNAVAILABLE: &str = "service_unavailable";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            report: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Not authenticated",
        )
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, "Not authorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            codes::VALIDATION,
            message,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        let (code, message) = match &err {
            AppError::Domain(DomainError::Validation { field, message }) => {
                (codes::VALIDATION, format!("{field}: {message}"))
            }
            AppError::Domain(DomainError::NotFound { .. }) | AppError::NotFound => {
                (codes::NOT_FOUND, err.presentation_message().to_string())
            }
            AppError::Conflict(subject) => (codes::CONFLICT, format!("{subject} already in use")),
            _ if status == StatusCode::SERVICE_UNAVAILABLE => {
                (codes::UNAVAILABLE, err.presentation_message().to_string())
            }
            _ => (codes::INTERNAL, err.presentation_message().to_string()),
        };
        let report = ErrorReport::from_error("infra::http::api", status, &err);
        Self {
            status,
            code,
            message,
            report: Some(report),
        }
    }
}

impl From<PostError> for ApiError {
    fn from(err: PostError) -> Self {
        AppError::from(err).into()
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        AppError::from(err).into()
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        AppError::from(err).into()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        AppError::from(err).into()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        AppError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::failure(ApiErrorMessage {
            code: self.code.to_string(),
            message: self.message.clone(),
        });
        let mut response = (self.status, body).into_response();
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!("{}: {}", self.code, self.message),
            )
        });
        report.attach(&mut response);
        response
    }
}
