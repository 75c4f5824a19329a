//! Authentication: credentials, sessions, the admin gate, and login throttling.

mod credentials;
mod gate;
mod login;
mod session;
mod throttle;

pub use credentials::{BcryptHasher, CredentialError, CredentialService, NewUser, PasswordHasher};
pub use gate::{GateDecision, LOGIN_PATH, PathClass, classify_path, decide, decide_on_error};
pub use login::{AuthService, LoginOutcome, METRIC_LOGIN_RATE_LIMITED};
pub use session::{Identity, SessionCarrier, SessionService, SessionState};
pub use throttle::{LoginRateLimiter, Throttle};
