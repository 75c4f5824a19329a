//! HTTP surface: JSON API, minimal HTML pages, and the admin gate.

pub mod api;
mod middleware;
mod pages;
mod session;

pub use middleware::{RequestContext, admin_gate};
pub use session::{ClientAddr, CookieSession, LOGIN_ERROR_COOKIE, SESSION_COOKIE};

use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::application::auth::AuthService;
use crate::application::error::ErrorReport;
use crate::application::feed::FeedService;
use crate::application::posts::PostService;
use crate::application::repos::{HealthRepo, RepoError, TagsRepo};
use crate::config::AuthorSettings;

use self::middleware::{log_responses, set_request_context};

/// Everything a handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub posts: Arc<PostService>,
    pub feed: Arc<FeedService>,
    pub tags: Arc<dyn TagsRepo>,
    pub health: Arc<dyn HealthRepo>,
    pub author: Arc<AuthorSettings>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Derive the cookie encryption key from the configured secret.
///
/// The secret may be any length; it is stretched through SHA-512 to the 64
/// bytes the cookie key needs.
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(&digest[..])
}

pub fn build_router(state: AppState) -> Router {
    let gate_state = state.clone();

    Router::new()
        .merge(api::build_api_router())
        .merge(pages::build_page_router())
        .route("/health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(gate_state, admin_gate))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health(State(state): State<AppState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => unavailable(err),
    }
}

fn unavailable(err: RepoError) -> Response {
    let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
    ErrorReport::from_error(
        "infra::http::health",
        StatusCode::SERVICE_UNAVAILABLE,
        &err,
    )
    .attach(&mut response);
    response
}
