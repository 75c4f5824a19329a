use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use time::OffsetDateTime;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::auth::{
    GateDecision, Identity, LOGIN_PATH, PathClass, classify_path, decide, decide_on_error,
};
use crate::application::error::ErrorReport;

use super::AppState;
use super::api::error::ApiError;
use super::session::CookieSession;

const LOG_TARGET: &str = "qubit::http::gate";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let username = response
            .extensions()
            .get::<Identity>()
            .map(|identity| identity.user.username.clone());
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "qubit::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                username = username.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "qubit::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                username = username.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}

/// Resolve the session on admin paths and apply the access decision.
///
/// Public paths pass straight through without touching the session. On an
/// allowed admin request the resolved [`Identity`] is attached to the request
/// and echoed onto the response for the logging middleware.
pub async fn admin_gate(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let class = classify_path(request.uri().path());
    if class == PathClass::Public {
        return next.run(request).await;
    }

    let mut session = CookieSession::new(jar);
    let decision = match state
        .auth
        .sessions()
        .resolve(&mut session, OffsetDateTime::now_utc())
        .await
    {
        Ok(resolved) => decide(class, resolved),
        Err(err) => {
            warn!(
                target: LOG_TARGET,
                path = %request.uri().path(),
                class = class.as_str(),
                error = %err,
                "Session resolution failed; denying admin access"
            );
            decide_on_error(class)
        }
    };

    let response = match decision {
        GateDecision::Allow(identity) => {
            if let Some(identity) = identity.clone() {
                request.extensions_mut().insert(identity);
            }
            let mut response = next.run(request).await;
            if let Some(identity) = identity {
                response.extensions_mut().insert(identity);
            }
            response
        }
        GateDecision::RedirectToLogin => {
            debug!(
                target: LOG_TARGET,
                path = %request.uri().path(),
                "Redirecting to login"
            );
            Redirect::to(LOGIN_PATH).into_response()
        }
        GateDecision::Unauthorized => ApiError::unauthorized().into_response(),
        GateDecision::Forbidden => ApiError::forbidden().into_response(),
    };

    (session.into_jar(), response).into_response()
}
