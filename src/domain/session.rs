//! Session claims carried by the signed session cookie.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub username: String,
    pub is_admin: bool,
    /// Expiry as a unix timestamp in seconds.
    pub exp: i64,
}

impl SessionClaims {
    pub fn issue(
        username: impl Into<String>,
        is_admin: bool,
        now: OffsetDateTime,
        lifetime: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            is_admin,
            exp: (now + lifetime).unix_timestamp(),
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }
}
