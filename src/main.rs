use std::{process, sync::Arc, time::Duration};

use immob::{
    application::{
        auth::JwtAuthenticator,
        error::AppError,
        favorites::FavoriteService,
        feedback::FeedbackService,
        mailer::{LogMailer, Mailer},
        notifications::NotificationService,
        properties::PropertyService,
        repos::{
            FavoritesRepo, FeedbackRepo, MediaRepo, NotificationsRepo, PropertiesRepo,
            PropertiesWriteRepo, ReviewsRepo, UsersRepo,
        },
        reviews::ReviewService,
        users::UserService,
    },
    cache::ResponseCache,
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{ApiRateLimiter, ApiState, PagesState, build_api_router, build_pages_router},
        media::MediaStorage,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
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
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    serve(settings).await
}

async fn serve(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let jwt_secret = settings
        .auth
        .jwt_secret
        .as_ref()
        .ok_or_else(|| InfraError::configuration("auth jwt secret is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));

    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let properties_repo: Arc<dyn PropertiesRepo> = repositories.clone();
    let properties_write_repo: Arc<dyn PropertiesWriteRepo> = repositories.clone();
    let media_repo: Arc<dyn MediaRepo> = repositories.clone();
    let favorites_repo: Arc<dyn FavoritesRepo> = repositories.clone();
    let reviews_repo: Arc<dyn ReviewsRepo> = repositories.clone();
    let notifications_repo: Arc<dyn NotificationsRepo> = repositories.clone();
    let feedback_repo: Arc<dyn FeedbackRepo> = repositories.clone();

    let cache = Arc::new(ResponseCache::new(settings.cache.clone()));
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(settings.mail.from_address.clone()));
    let jwt = Arc::new(JwtAuthenticator::new(
        jwt_secret,
        settings.auth.access_token_ttl(),
        settings.auth.refresh_token_ttl(),
    ));

    let media_storage = Arc::new(
        MediaStorage::new(settings.media.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let users = Arc::new(UserService::new(
        users_repo,
        jwt,
        mailer.clone(),
        settings.auth.reset_token_ttl(),
        settings.auth.frontend_url.clone(),
    ));
    let properties = Arc::new(PropertyService::new(
        properties_repo.clone(),
        properties_write_repo,
        media_repo,
        cache.clone(),
    ));
    let favorites = Arc::new(FavoriteService::new(
        favorites_repo,
        properties_repo.clone(),
        notifications_repo.clone(),
        cache.clone(),
    ));
    let reviews = Arc::new(ReviewService::new(
        reviews_repo,
        properties_repo,
        cache.clone(),
    ));
    let notifications = Arc::new(NotificationService::new(notifications_repo));
    let feedback = Arc::new(FeedbackService::new(feedback_repo, mailer));

    let rate_limiter = Arc::new(ApiRateLimiter::new(
        Duration::from_secs(settings.api_rate_limit.window_seconds.get() as u64),
        settings.api_rate_limit.max_requests.get(),
    ));

    let api_state = ApiState {
        users,
        properties,
        favorites,
        reviews,
        notifications,
        feedback,
        media_storage: media_storage.clone(),
        rate_limiter,
    };

    let pages_state = PagesState {
        db: repositories,
        media_storage,
    };

    let upload_body_limit = settings.media.max_request_bytes.get() as usize;
    let router = build_pages_router(pages_state).merge(build_api_router(api_state, upload_body_limit));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "immob::server",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
    }
}
