//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CliArgs, Command, CreateAdminArgs, DatabaseOverride, ResetPasswordArgs, ServeArgs,
    ServeOverrides, SetAdminArgs,
};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "qubit";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "qubit";
const DEFAULT_DB_USER: &str = "qubit";
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 5;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_CACHE_URL: &str = "redis://localhost:6379/0";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_MEMORY_CAPACITY: usize = 1024;
const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: u64 = 30;
const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u64 = 15;
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
    pub author: AuthorSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Either a full `url` or the discrete connection fields are used, never a mix.
#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend `{other}` (expected redis or memory)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub url: String,
    pub ttl: Duration,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Clone)]
pub struct AuthSettings {
    secret_key: Option<String>,
    pub session_lifetime: time::Duration,
    pub login_attempts_per_minute: NonZeroU32,
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    /// The cookie secret; serving without one is refused.
    pub fn secret_key(&self) -> Result<&str, LoadError> {
        self.secret_key.as_deref().ok_or_else(|| {
            LoadError::invalid(
                "auth.secret_key",
                "must be set (QUBIT__AUTH__SECRET_KEY or AUTH_SECRET_KEY)",
            )
        })
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("session_lifetime", &self.session_lifetime)
            .field("login_attempts_per_minute", &self.login_attempts_per_minute)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Profile shown on the about page.
#[derive(Debug, Clone, Default)]
pub struct AuthorSettings {
    pub name: String,
    pub short_name: String,
    pub bio: String,
    pub github: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("QUBIT").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::CreateAdmin(args)) => raw.apply_database_override(&args.database),
        Some(Command::ResetAdminPassword(args)) => raw.apply_database_override(&args.database),
        Some(Command::SetAdmin(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    auth: RawAuthSettings,
    author: RawAuthorSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(secret) = overrides.auth_secret_key.as_ref() {
            self.auth.secret_key = Some(secret.clone());
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.cache_url.as_ref() {
            self.cache.url = Some(url.clone());
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(password) = overrides.database_password.as_ref() {
            self.database.password = Some(password.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            auth,
            author,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            auth: build_auth_settings(auth)?,
            author: build_author_settings(author),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let min_connections = non_zero_u32(
        database
            .min_connections
            .unwrap_or(DEFAULT_DB_MIN_CONNECTIONS)
            .into(),
        "database.min_connections",
    )?
    .get();
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?
    .get();
    if min_connections > max_connections {
        return Err(LoadError::invalid(
            "database.min_connections",
            "must not exceed database.max_connections",
        ));
    }

    let port = database.port.unwrap_or(DEFAULT_DB_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "database.port",
            "port must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url: non_empty(database.url),
        host: non_empty(database.host).unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
        port,
        name: non_empty(database.name).unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
        user: non_empty(database.user).unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
        password: non_empty(database.password),
        min_connections,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match non_empty(cache.backend) {
        Some(value) => CacheBackendKind::from_str(&value)
            .map_err(|reason| LoadError::invalid("cache.backend", reason))?,
        None => CacheBackendKind::Redis,
    };

    let ttl_secs = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let memory_capacity =
        NonZeroUsize::new(cache.memory_capacity.unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY))
            .ok_or_else(|| {
                LoadError::invalid("cache.memory_capacity", "must be greater than zero")
            })?;

    Ok(CacheSettings {
        backend,
        url: non_empty(cache.url).unwrap_or_else(|| DEFAULT_CACHE_URL.to_string()),
        ttl: Duration::from_secs(ttl_secs),
        memory_capacity,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let minutes = non_zero_u32(
        auth.access_token_expire_minutes
            .unwrap_or(DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES),
        "auth.access_token_expire_minutes",
    )?;
    let login_attempts_per_minute = non_zero_u32(
        auth.login_attempts_per_minute
            .unwrap_or(DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE),
        "auth.login_attempts_per_minute",
    )?;

    let bcrypt_cost = auth.bcrypt_cost.unwrap_or(bcrypt::DEFAULT_COST);
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
        return Err(LoadError::invalid(
            "auth.bcrypt_cost",
            format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"),
        ));
    }

    Ok(AuthSettings {
        secret_key: non_empty(auth.secret_key),
        session_lifetime: time::Duration::minutes(i64::from(minutes.get())),
        login_attempts_per_minute,
        bcrypt_cost,
    })
}

fn build_author_settings(author: RawAuthorSettings) -> AuthorSettings {
    AuthorSettings {
        name: author.name.unwrap_or_default(),
        short_name: author.short_name.unwrap_or_default(),
        bio: author.bio.unwrap_or_default(),
        github: non_empty(author.github),
        website: non_empty(author.website),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    name: Option<String>,
    user: Option<String>,
    password: Option<String>,
    min_connections: Option<u32>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    url: Option<String>,
    ttl_seconds: Option<u64>,
    memory_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    secret_key: Option<String>,
    access_token_expire_minutes: Option<u64>,
    login_attempts_per_minute: Option<u64>,
    bcrypt_cost: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthorSettings {
    name: Option<String>,
    short_name: Option<String>,
    bio: Option<String>,
    github: Option<String>,
    website: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
