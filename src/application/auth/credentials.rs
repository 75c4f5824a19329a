//! Password credentials and admin account management.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::validation::{check_email, check_length, check_optional_length};

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 72;
// Verified against when the username is unknown, so lookups cost the same.
const DUMMY_PASSWORD: &str = "qubit-timing-equaliser";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("a user with that username or email already exists")]
    Conflict,
    #[error("user not found")]
    NotFound,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for CredentialError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } => Self::Conflict,
            RepoError::NotFound => Self::NotFound,
            other => Self::Repo(other),
        }
    }
}

/// One-way password hashing. Implementations may block; callers run them on
/// the blocking pool.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, CredentialError>;

    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        bcrypt::hash(password, self.cost).map_err(|err| CredentialError::Hashing(err.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        bcrypt::verify(password, hash).map_err(|err| CredentialError::Hashing(err.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub is_admin: bool,
}

impl NewUser {
    fn validate(&self) -> Result<(), DomainError> {
        check_length("username", &self.username, 3, 50)?;
        check_email("email", &self.email)?;
        validate_password(&self.password)?;
        check_optional_length("display_name", self.display_name.as_deref(), 100)?;
        check_optional_length("bio", self.bio.as_deref(), 500)?;
        Ok(())
    }
}

fn validate_password(password: &str) -> Result<(), DomainError> {
    check_length("password", password, MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH)
}

pub struct CredentialService {
    users: Arc<dyn UsersRepo>,
    hasher: Arc<dyn PasswordHasher>,
    dummy_hash: OnceCell<String>,
}

impl CredentialService {
    pub fn new(users: Arc<dyn UsersRepo>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            users,
            hasher,
            dummy_hash: OnceCell::new(),
        }
    }

    pub async fn register(&self, candidate: NewUser) -> Result<UserRecord, CredentialError> {
        let username = candidate.username.trim().to_string();
        let email = candidate.email.trim().to_string();
        let candidate = NewUser {
            username,
            email,
            ..candidate
        };
        candidate.validate()?;

        let password_hash = self.hash(candidate.password).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username: candidate.username,
                email: candidate.email,
                password_hash,
                display_name: candidate.display_name,
                bio: candidate.bio,
                is_admin: candidate.is_admin,
            })
            .await?;

        info!(
            target: "qubit::auth::credentials",
            username = %user.username,
            is_admin = user.is_admin,
            "Registered user"
        );
        Ok(user)
    }

    /// Check a username/password pair. Unknown users, inactive users, and
    /// wrong passwords all yield `Ok(None)`, and all of them pay for one
    /// hash verification.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, CredentialError> {
        let (hash, user) = match self.users.find_by_username(username).await? {
            Some(record) => (record.password_hash, Some(record.user)),
            None => (self.dummy_hash().await?.to_string(), None),
        };

        let verified = self.verify(password.to_string(), hash).await?;
        Ok(user.filter(|user| verified && user.is_active))
    }

    pub async fn set_admin(&self, username: &str, is_admin: bool) -> Result<(), CredentialError> {
        self.users.set_admin(username, is_admin).await?;
        info!(
            target: "qubit::auth::credentials",
            username,
            is_admin,
            "Updated admin flag"
        );
        Ok(())
    }

    pub async fn reset_password(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), CredentialError> {
        if password != confirmation {
            return Err(DomainError::validation("password", "passwords do not match").into());
        }
        validate_password(password)?;

        let password_hash = self.hash(password.to_string()).await?;
        self.users
            .update_password_hash(username, &password_hash)
            .await?;
        info!(
            target: "qubit::auth::credentials",
            username,
            "Reset password"
        );
        Ok(())
    }

    async fn dummy_hash(&self) -> Result<&str, CredentialError> {
        self.dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD.to_string()))
            .await
            .map(String::as_str)
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, CredentialError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|err| CredentialError::Hashing(err.to_string()))?
    }

    async fn hash(&self, password: String) -> Result<String, CredentialError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| CredentialError::Hashing(err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::entities::AuthRecord;

    #[derive(Default)]
    struct Users {
        rows: Mutex<Vec<AuthRecord>>,
    }

    #[async_trait]
    impl UsersRepo for Users {
        async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
            let mut rows = self.rows.lock().await;
            if rows
                .iter()
                .any(|r| r.user.username == params.username || r.user.email == params.email)
            {
                return Err(RepoError::Duplicate {
                    constraint: "users_username_key".into(),
                });
            }
            let now = OffsetDateTime::now_utc();
            let user = UserRecord {
                id: rows.len() as i32 + 1,
                username: params.username,
                email: params.email,
                display_name: params.display_name,
                bio: params.bio,
                is_active: true,
                is_admin: params.is_admin,
                created_at: now,
                updated_at: now,
            };
            rows.push(AuthRecord {
                user: user.clone(),
                password_hash: params.password_hash,
            });
            Ok(user)
        }

        async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
            Ok(self
                .find_by_username(username)
                .await?
                .map(|record| record.user))
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<AuthRecord>, RepoError> {
            let rows = self.rows.lock().await;
            Ok(rows.iter().find(|r| r.user.username == username).cloned())
        }

        async fn set_admin(&self, username: &str, is_admin: bool) -> Result<(), RepoError> {
            let mut rows = self.rows.lock().await;
            let row = rows
                .iter_mut()
                .find(|r| r.user.username == username)
                .ok_or(RepoError::NotFound)?;
            row.user.is_admin = is_admin;
            Ok(())
        }

        async fn update_password_hash(
            &self,
            username: &str,
            password_hash: &str,
        ) -> Result<(), RepoError> {
            let mut rows = self.rows.lock().await;
            let row = rows
                .iter_mut()
                .find(|r| r.user.username == username)
                .ok_or(RepoError::NotFound)?;
            row.password_hash = password_hash.to_string();
            Ok(())
        }
    }

    fn service() -> (Arc<Users>, CredentialService) {
        let users = Arc::new(Users::default());
        let service = CredentialService::new(users.clone(), Arc::new(BcryptHasher::new(4)));
        (users, service)
    }

    fn admin() -> NewUser {
        NewUser {
            username: "admin".into(),
            email: "admin@example.com".into(),
            password: "correct horse".into(),
            display_name: None,
            bio: None,
            is_admin: true,
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let (users, credentials) = service();
        credentials.register(admin()).await.unwrap();

        let stored = users.find_by_username("admin").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "correct horse");

        let user = credentials
            .authenticate("admin", "correct horse")
            .await
            .unwrap();
        assert_eq!(user.map(|u| u.username).as_deref(), Some("admin"));
        assert!(
            credentials
                .authenticate("admin", "wrong horse")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            credentials
                .authenticate("nobody", "correct horse")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (_, credentials) = service();
        credentials.register(admin()).await.unwrap();

        let err = credentials.register(admin()).await.unwrap_err();
        assert!(matches!(err, CredentialError::Conflict));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_hashing() {
        let (users, credentials) = service();
        let err = credentials
            .register(NewUser {
                password: "short".into(),
                ..admin()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CredentialError::Invalid(DomainError::Validation { field: "password", .. })
        ));
        assert!(users.rows.lock().await.is_empty());
    }

    #[tokio::test]
    async fn inactive_users_cannot_authenticate() {
        let (users, credentials) = service();
        credentials.register(admin()).await.unwrap();
        users.rows.lock().await[0].user.is_active = false;

        assert!(
            credentials
                .authenticate("admin", "correct horse")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn reset_password_requires_matching_confirmation() {
        let (_, credentials) = service();
        credentials.register(admin()).await.unwrap();

        let err = credentials
            .reset_password("admin", "new password", "new passw0rd")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Invalid(_)));

        credentials
            .reset_password("admin", "new password", "new password")
            .await
            .unwrap();
        assert!(
            credentials
                .authenticate("admin", "new password")
                .await
                .unwrap()
                .is_some()
        );
    }

    struct CountingHasher {
        inner: BcryptHasher,
        verifies: AtomicUsize,
    }

    impl PasswordHasher for CountingHasher {
        fn hash(&self, password: &str) -> Result<String, CredentialError> {
            self.inner.hash(password)
        }

        fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(password, hash)
        }
    }

    #[tokio::test]
    async fn unknown_users_still_pay_for_a_verification() {
        let hasher = Arc::new(CountingHasher {
            inner: BcryptHasher::new(4),
            verifies: Default::default(),
        });
        let credentials = CredentialService::new(Arc::new(Users::default()), hasher.clone());

        for _ in 0..2 {
            let user = credentials
                .authenticate("nobody", DUMMY_PASSWORD)
                .await
                .unwrap();
            assert!(user.is_none());
        }
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reset_password_for_missing_user_is_not_found() {
        let (_, credentials) = service();
        let err = credentials
            .reset_password("admin", "new password", "new password")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::NotFound));
    }
}
