//! Session issuance and resolution.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::session::SessionClaims;

const LOG_TARGET: &str = "qubit::auth::session";

/// Storage for the session payload attached to a client.
///
/// The HTTP layer backs this with an encrypted cookie jar; tests use an
/// in-memory stand-in.
pub trait SessionCarrier: Send {
    fn load(&self) -> Option<SessionClaims>;

    fn store(&mut self, claims: &SessionClaims);

    fn clear(&mut self);
}

/// A resolved caller. `is_admin` comes from the session, not the user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: UserRecord,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(Identity),
}

pub struct SessionService {
    users: Arc<dyn UsersRepo>,
    lifetime: Duration,
}

impl SessionService {
    pub fn new(users: Arc<dyn UsersRepo>, lifetime: Duration) -> Self {
        Self { users, lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Replace whatever the carrier holds with a fresh session for `user`.
    pub fn issue<C>(&self, carrier: &mut C, user: &UserRecord, now: OffsetDateTime) -> SessionClaims
    where
        C: SessionCarrier + ?Sized,
    {
        carrier.clear();
        let claims = SessionClaims::issue(user.username.clone(), user.is_admin, now, self.lifetime);
        carrier.store(&claims);
        claims
    }

    pub async fn resolve<C>(
        &self,
        carrier: &mut C,
        now: OffsetDateTime,
    ) -> Result<SessionState, RepoError>
    where
        C: SessionCarrier + ?Sized,
    {
        let Some(claims) = carrier.load() else {
            return Ok(SessionState::Anonymous);
        };

        if claims.is_expired(now) {
            debug!(
                target: LOG_TARGET,
                username = %claims.username,
                "Clearing expired session"
            );
            carrier.clear();
            return Ok(SessionState::Anonymous);
        }

        let Some(user) = self.users.find_user(&claims.username).await? else {
            debug!(
                target: LOG_TARGET,
                username = %claims.username,
                "Session refers to unknown user"
            );
            return Ok(SessionState::Anonymous);
        };

        Ok(SessionState::Authenticated(Identity {
            user,
            is_admin: claims.is_admin,
        }))
    }

    /// Clear the session. Safe to call when none exists.
    pub fn end<C>(&self, carrier: &mut C)
    where
        C: SessionCarrier + ?Sized,
    {
        carrier.clear();
    }
}
