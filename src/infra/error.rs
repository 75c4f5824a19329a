//! Failures raised while bringing up or talking to external services.

use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {message}")]
    Database { message: String },
    #[error("cache error: {message}")]
    Cache { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

impl From<sqlx::Error> for InfraError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(source) => Self::configuration(source.to_string()),
            other => Self::database(other.to_string()),
        }
    }
}

impl From<MigrateError> for InfraError {
    fn from(err: MigrateError) -> Self {
        Self::database(format!("migration failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_database_errors() {
        let err = InfraError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, InfraError::Database { .. }));
    }

    #[test]
    fn bad_connection_settings_are_configuration_errors() {
        let err = InfraError::from(sqlx::Error::Configuration("missing host".into()));
        assert!(matches!(err, InfraError::Configuration { .. }));
        assert_eq!(err.to_string(), "configuration error: missing host");
    }
}
