//! Login, logout, and the admin probe.

use axum::Form;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use crate::application::auth::{Identity, LOGIN_PATH};
use crate::infra::http::AppState;
use crate::infra::http::api::envelope::ApiResponse;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::session::{ClientAddr, CookieSession, LOGIN_ERROR_COOKIE, scoped_cookie};

pub const HUB_PATH: &str = "/admin/hub";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminCheck {
    pub is_admin: bool,
}

/// Form login. Both outcomes redirect; failures leave a one-shot error code
/// for the login page to display.
pub async fn login(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let mut session = CookieSession::new(jar);
    let outcome = state
        .auth
        .login(&client, &form.username, &form.password, &mut session)
        .await?;
    let jar = session.into_jar();

    match outcome.error_code() {
        None => Ok((jar, Redirect::to(HUB_PATH)).into_response()),
        Some(code) => {
            let jar = jar.add(scoped_cookie(LOGIN_ERROR_COOKIE, code.to_string()));
            Ok((jar, Redirect::to(LOGIN_PATH)).into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    let mut session = CookieSession::new(jar);
    state.auth.logout(&mut session);
    (session.into_jar(), Redirect::to("/")).into_response()
}

pub async fn admin_check(Extension(identity): Extension<Identity>) -> ApiResponse<AdminCheck> {
    ApiResponse::ok(AdminCheck {
        is_admin: identity.is_admin,
    })
}
