use std::{net::SocketAddr, process, sync::Arc};

use qubit::{
    application::{
        auth::{
            AuthService, BcryptHasher, CredentialError, CredentialService, LoginRateLimiter,
            NewUser, SessionService,
        },
        error::AppError,
        feed::FeedService,
        posts::PostService,
        render::ComrakRenderer,
        repos::{FeedRepo, HealthRepo, PostsRepo, PostsWriteRepo, TagsRepo, UsersRepo},
    },
    cache::{CacheBackend, ContentCache, MemoryCacheBackend},
    config::{self, CacheBackendKind, CacheSettings},
    infra::{
        cache::RedisCacheBackend,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CreateAdmin(args) => run_create_admin(settings, args).await,
        config::Command::ResetAdminPassword(args) => run_reset_password(settings, args).await,
        config::Command::SetAdmin(args) => run_set_admin(settings, args).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = PostgresRepositories::connect(&settings.database).await?;

    PostgresRepositories::run_migrations(&pool).await?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn credential_service(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> CredentialService {
    let users: Arc<dyn UsersRepo> = repositories.clone();
    CredentialService::new(users, Arc::new(BcryptHasher::new(settings.auth.bcrypt_cost)))
}

fn build_cache(settings: &CacheSettings) -> Result<ContentCache, AppError> {
    let backend: Arc<dyn CacheBackend> = match settings.backend {
        CacheBackendKind::Redis => Arc::new(RedisCacheBackend::new(&settings.url)?),
        CacheBackendKind::Memory => Arc::new(MemoryCacheBackend::new(settings.memory_capacity)),
    };
    info!(
        target = "qubit::serve",
        backend = ?settings.backend,
        ttl_secs = settings.ttl.as_secs(),
        "Configured content cache"
    );
    Ok(ContentCache::new(backend, settings.ttl))
}

fn build_app_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<AppState, AppError> {
    let secret = settings.auth.secret_key()?;

    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let feed_repo: Arc<dyn FeedRepo> = repositories.clone();
    let tags_repo: Arc<dyn TagsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let credentials = Arc::new(credential_service(&repositories, settings));
    let sessions = Arc::new(SessionService::new(
        users_repo,
        settings.auth.session_lifetime,
    ));
    let limiter = LoginRateLimiter::per_minute(settings.auth.login_attempts_per_minute.get());
    let auth = Arc::new(AuthService::new(credentials, sessions, limiter));

    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        build_cache(&settings.cache)?,
        Arc::new(ComrakRenderer::new()),
    ));

    Ok(AppState {
        auth,
        posts,
        feed: Arc::new(FeedService::new(feed_repo)),
        tags: tags_repo,
        health: health_repo,
        author: Arc::new(settings.author.clone()),
        cookie_key: http::cookie_key(secret),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    // Fail on a missing secret before touching the database.
    settings.auth.secret_key()?;

    let repositories = init_repositories(&settings).await?;
    let state = build_app_state(repositories, &settings)?;

    let limiter = state.auth.limiter().clone();
    let prune_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let result = serve_http(&settings, state).await;

    prune_handle.abort();
    let _ = prune_handle.await;

    result
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "qubit::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = stop_rx.await;
        })
        .await
    });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        _ = tokio::signal::ctrl_c() => {
            info!(target = "qubit::serve", "Shutdown signal received");
            let _ = stop_tx.send(());
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "qubit::serve",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn run_create_admin(
    settings: config::Settings,
    args: config::CreateAdminArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let credentials = credential_service(&repositories, &settings);

    let candidate = NewUser {
        username: args.username,
        email: args.email,
        password: args.password,
        display_name: args.display_name,
        bio: None,
        is_admin: true,
    };

    match credentials.register(candidate).await {
        Ok(user) => {
            info!(
                target = "qubit::cli",
                username = %user.username,
                "Created admin user"
            );
            Ok(())
        }
        Err(CredentialError::Conflict) => {
            warn!(
                target = "qubit::cli",
                "A user with that username or email already exists; nothing to do"
            );
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_reset_password(
    settings: config::Settings,
    args: config::ResetPasswordArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let credentials = credential_service(&repositories, &settings);

    credentials
        .reset_password(&args.username, &args.password, &args.confirm)
        .await?;
    info!(
        target = "qubit::cli",
        username = %args.username,
        "Password reset"
    );
    Ok(())
}

async fn run_set_admin(
    settings: config::Settings,
    args: config::SetAdminArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let credentials = credential_service(&repositories, &settings);

    let is_admin = !args.revoke;
    credentials.set_admin(&args.username, is_admin).await?;
    info!(
        target = "qubit::cli",
        username = %args.username,
        is_admin,
        "Admin flag updated"
    );
    Ok(())
}
