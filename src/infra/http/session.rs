//! Encrypted-cookie session storage and client address extraction.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tracing::warn;

use crate::application::auth::SessionCarrier;
use crate::domain::session::SessionClaims;

pub const SESSION_COOKIE: &str = "qubit_session";
pub const LOGIN_ERROR_COOKIE: &str = "qubit_login_error";

/// Session claims stored as JSON inside a private (encrypted and
/// authenticated) cookie. Tampered or undecodable cookies read as absent.
pub struct CookieSession {
    jar: PrivateCookieJar,
}

impl CookieSession {
    pub fn new(jar: PrivateCookieJar) -> Self {
        Self { jar }
    }

    /// Hand back the jar so pending cookie changes reach the response.
    pub fn into_jar(self) -> PrivateCookieJar {
        self.jar
    }
}

impl SessionCarrier for CookieSession {
    fn load(&self) -> Option<SessionClaims> {
        let cookie = self.jar.get(SESSION_COOKIE)?;
        serde_json::from_str(cookie.value()).ok()
    }

    fn store(&mut self, claims: &SessionClaims) {
        let payload = match serde_json::to_string(claims) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target: "qubit::http::session",
                    error = %err,
                    "Failed to encode session claims"
                );
                return;
            }
        };
        self.jar = self.jar.clone().add(scoped_cookie(SESSION_COOKIE, payload));
    }

    fn clear(&mut self) {
        self.jar = self
            .jar
            .clone()
            .remove(Cookie::build(SESSION_COOKIE).path("/"));
    }
}

/// Root-scoped, HTTP-only cookie with lax same-site policy.
pub fn scoped_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Remote address of the caller, used as the login throttle key.
///
/// Falls back to `"unknown"` when the server was not started with connect info,
/// which is the case for routers driven directly in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self(addr))
    }
}
