//! Path classification and the admin access decision.

use super::session::{Identity, SessionState};

pub const LOGIN_PATH: &str = "/login";

const PUBLIC_PATHS: [&str; 8] = [
    "/",
    "/login",
    "/api/login",
    "/api/logout",
    "/about",
    "/posts",
    "/static",
    "/api/posts/search",
];

const PUBLIC_PREFIXES: [&str; 2] = ["/static/", "/posts/"];

const ADMIN_API_PREFIX: &str = "/api/admin";
const ADMIN_PAGE_PREFIX: &str = "/admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    AdminApi,
    AdminPage,
}

impl PathClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathClass::Public => "public",
            PathClass::AdminApi => "admin_api",
            PathClass::AdminPage => "admin_page",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Let the request through, attaching the identity when one was resolved.
    Allow(Option<Identity>),
    RedirectToLogin,
    Unauthorized,
    Forbidden,
}

/// Allow-listed paths win; everything outside the admin prefixes is public.
pub fn classify_path(path: &str) -> PathClass {
    if PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return PathClass::Public;
    }
    if path.starts_with(ADMIN_API_PREFIX) {
        PathClass::AdminApi
    } else if path.starts_with(ADMIN_PAGE_PREFIX) {
        PathClass::AdminPage
    } else {
        PathClass::Public
    }
}

pub fn decide(class: PathClass, state: SessionState) -> GateDecision {
    match (class, state) {
        (PathClass::Public, _) => GateDecision::Allow(None),
        (_, SessionState::Authenticated(identity)) if identity.is_admin => {
            GateDecision::Allow(Some(identity))
        }
        (PathClass::AdminApi, SessionState::Anonymous) => GateDecision::Unauthorized,
        (PathClass::AdminApi, SessionState::Authenticated(_)) => GateDecision::Forbidden,
        (PathClass::AdminPage, _) => GateDecision::RedirectToLogin,
    }
}

/// Outcome when the session could not be resolved at all.
pub fn decide_on_error(class: PathClass) -> GateDecision {
    match class {
        PathClass::Public => GateDecision::Allow(None),
        PathClass::AdminApi => GateDecision::Forbidden,
        PathClass::AdminPage => GateDecision::RedirectToLogin,
    }
}
