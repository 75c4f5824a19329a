//! Postgres-backed repository implementations.

mod feed;
mod posts;
mod tags;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, Transaction,
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{HealthRepo, RepoError};
use crate::config::DatabaseSettings;
use crate::infra::error::InfraError;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, InfraError> {
        let options = connect_options(settings)?;
        PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .map_err(InfraError::from)
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), InfraError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }

    fn convert_offset(value: u64) -> Result<i64, RepoError> {
        value.try_into().map_err(|_| RepoError::InvalidInput {
            message: "offset exceeds supported range".to_string(),
        })
    }
}

/// A full URL wins; otherwise the discrete host/port/name/user/password fields are used.
pub fn connect_options(settings: &DatabaseSettings) -> Result<PgConnectOptions, InfraError> {
    if let Some(url) = settings.url.as_deref() {
        return PgConnectOptions::from_str(url)
            .map_err(|err| InfraError::configuration(format!("invalid database.url: {err}")));
    }

    let mut options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .database(&settings.name)
        .username(&settings.user);
    if let Some(password) = settings.password.as_deref() {
        options = options.password(password);
    }
    Ok(options)
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
