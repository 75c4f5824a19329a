use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        auth::CredentialError, feed::FeedError, posts::PostError, repos::RepoError,
    },
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Error details attached to a response for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Repo(RepoError),
    #[error("resource not found")]
    NotFound,
    #[error("conflicting resource: {0}")]
    Conflict(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::NotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::Domain(DomainError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Infra(InfraError::Database { .. }) | AppError::Repo(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Infra(_) | AppError::Config(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::NotFound => {
                "Resource not found"
            }
            AppError::Domain(DomainError::Validation { .. }) => "Request could not be processed",
            AppError::Conflict(_) => "Resource already exists",
            AppError::Infra(InfraError::Database { .. }) | AppError::Repo(_) => {
                "Service temporarily unavailable"
            }
            AppError::Infra(InfraError::Configuration { .. }) | AppError::Config(_) => {
                "Service misconfigured"
            }
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound,
            RepoError::Duplicate { constraint } => AppError::Conflict(constraint),
            other => AppError::Repo(other),
        }
    }
}

impl From<PostError> for AppError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Invalid(err) => AppError::Domain(err),
            PostError::NotFound => AppError::NotFound,
            PostError::SlugTaken => AppError::Conflict("slug".to_string()),
            PostError::Repo(err) => AppError::from(err),
        }
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Invalid(err) => AppError::Domain(err),
            FeedError::NotFound => AppError::NotFound,
            FeedError::Repo(err) => AppError::from(err),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Invalid(err) => AppError::Domain(err),
            CredentialError::Conflict => AppError::Conflict("username or email".to_string()),
            CredentialError::NotFound => AppError::NotFound,
            CredentialError::Hashing(message) => AppError::Unexpected(message),
            CredentialError::Repo(err) => AppError::from(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_report_walks_the_source_chain() {
        let err = AppError::from(PostError::Repo(RepoError::Timeout));
        let report = ErrorReport::from_error("test", StatusCode::SERVICE_UNAVAILABLE, &err);
        assert_eq!(report.messages, vec!["database timeout".to_string()]);
    }

    #[test]
    fn duplicate_rows_map_to_conflict() {
        let err = AppError::from(RepoError::Duplicate {
            constraint: "users_username_key".into(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_outages_map_to_service_unavailable() {
        let err = AppError::from(RepoError::Persistence("connection reset".into()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.presentation_message(), "Service temporarily unavailable");
    }
}
