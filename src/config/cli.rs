use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Qubit binary.
#[derive(Debug, Parser)]
#[command(name = "qubit", version, about = "Qubit blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "QUBIT_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Create an administrator account.
    #[command(name = "create-admin")]
    CreateAdmin(CreateAdminArgs),
    /// Replace a user's password.
    #[command(name = "reset-admin-password")]
    ResetAdminPassword(ResetPasswordArgs),
    /// Grant or revoke admin rights.
    #[command(name = "set-admin")]
    SetAdmin(SetAdminArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database password used with discrete connection settings.
    #[arg(
        long = "database-password",
        env = "DB_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true
    )]
    pub database_password: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Secret used to encrypt session cookies.
    #[arg(
        long = "auth-secret-key",
        env = "AUTH_SECRET_KEY",
        value_name = "SECRET",
        hide_env_values = true
    )]
    pub auth_secret_key: Option<String>,

    /// Override the cache backend (redis|memory).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the Redis URL.
    #[arg(long = "cache-url", env = "REDIS_URL", value_name = "URL")]
    pub cache_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateAdminArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, env = "ADMIN_USERNAME", value_name = "NAME")]
    pub username: String,

    #[arg(long, env = "ADMIN_EMAIL", value_name = "EMAIL")]
    pub email: String,

    #[arg(
        long,
        env = "ADMIN_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true
    )]
    pub password: String,

    #[arg(long = "display-name", value_name = "NAME")]
    pub display_name: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ResetPasswordArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, default_value = "admin", value_name = "NAME")]
    pub username: String,

    #[arg(long, value_name = "PASSWORD")]
    pub password: String,

    /// Must repeat `--password` exactly.
    #[arg(long, value_name = "PASSWORD")]
    pub confirm: String,
}

#[derive(Debug, Args, Clone)]
pub struct SetAdminArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, value_name = "NAME")]
    pub username: String,

    /// Remove admin rights instead of granting them.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub revoke: bool,
}
