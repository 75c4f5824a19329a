use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::credentials::{CredentialError, CredentialService};
use super::session::{SessionCarrier, SessionService};
use super::throttle::{LoginRateLimiter, Throttle};
use crate::domain::entities::UserRecord;

pub const METRIC_LOGIN_RATE_LIMITED: &str = "qubit_login_rate_limited_total";

const LOG_TARGET: &str = "qubit::auth::login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(UserRecord),
    InvalidCredentials,
    RateLimited,
}

impl LoginOutcome {
    /// Code surfaced to the login page after a failed attempt.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            LoginOutcome::Success(_) => None,
            LoginOutcome::InvalidCredentials => Some("invalid_credentials"),
            LoginOutcome::RateLimited => Some("too_many_attempts"),
        }
    }
}

/// Login and logout on top of credentials, sessions, and the attempt limiter.
pub struct AuthService {
    credentials: Arc<CredentialService>,
    sessions: Arc<SessionService>,
    limiter: LoginRateLimiter,
}

impl AuthService {
    pub fn new(
        credentials: Arc<CredentialService>,
        sessions: Arc<SessionService>,
        limiter: LoginRateLimiter,
    ) -> Self {
        Self {
            credentials,
            sessions,
            limiter,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionService> {
        &self.sessions
    }

    pub fn limiter(&self) -> &LoginRateLimiter {
        &self.limiter
    }

    pub async fn login<C>(
        &self,
        client: &str,
        username: &str,
        password: &str,
        carrier: &mut C,
    ) -> Result<LoginOutcome, CredentialError>
    where
        C: SessionCarrier + ?Sized,
    {
        if let Throttle::Limited { retry_after } = self.limiter.check(client) {
            counter!(METRIC_LOGIN_RATE_LIMITED).increment(1);
            warn!(
                target: LOG_TARGET,
                client,
                retry_after_secs = retry_after.as_secs(),
                "Login attempt rate limited"
            );
            return Ok(LoginOutcome::RateLimited);
        }

        let Some(user) = self.credentials.authenticate(username, password).await? else {
            info!(target: LOG_TARGET, client, username, "Rejected login attempt");
            return Ok(LoginOutcome::InvalidCredentials);
        };

        self.sessions.issue(carrier, &user, OffsetDateTime::now_utc());
        info!(
            target: LOG_TARGET,
            username = %user.username,
            is_admin = user.is_admin,
            "User logged in"
        );
        Ok(LoginOutcome::Success(user))
    }

    pub fn logout<C>(&self, carrier: &mut C)
    where
        C: SessionCarrier + ?Sized,
    {
        self.sessions.end(carrier);
    }
}
