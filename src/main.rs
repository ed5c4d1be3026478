//! Bibliotheca Server - library loans and reservations

use anyhow::Context;
use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bibliotheca_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{overdue, redis::RedisService, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Bibliotheca Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let redis_service = RedisService::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    tracing::info!("Connected to Redis");

    let repository = Repository::new(pool);
    let services = Services::new(
        repository,
        config.auth.clone(),
        config.email.clone(),
        redis_service,
    )
    .await
    .context("Failed to create services")?;

    services
        .auth
        .ensure_bootstrap_admin()
        .await
        .context("Failed to create bootstrap administrator")?;

    if config.scheduler.overdue_scan_enabled {
        let scheduler = overdue::spawn_scheduler(
            services.overdue.clone(),
            config.scheduler.overdue_scan_interval_hours,
        );
        tokio::spawn(async move {
            match scheduler.await {
                Err(e) if e.is_panic() => tracing::error!("Overdue scheduler panicked: {}", e),
                _ => tracing::warn!("Overdue scheduler stopped"),
            }
        });
        tracing::info!(
            interval_hours = config.scheduler.overdue_scan_interval_hours,
            "Overdue scan scheduled"
        );
    }

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse::<IpAddr>()
            .context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Console output (pretty or JSON) plus an optional daily rolling file
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bibliotheca_server={},tower_http=debug", logging.level).into());

    let (file_layer, guard) = match logging.directory.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "bibliotheca-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    guard
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/login", post(api::auth::login))
        .route("/auth/logout", post(api::auth::logout))
        .route("/auth/me", get(api::auth::me))
        .route("/auth/register", post(api::auth::register))
        // Books
        .route(
            "/books",
            get(api::books::list_books).post(api::books::create_book),
        )
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Members
        .route(
            "/members",
            get(api::members::list_members).post(api::members::create_member),
        )
        .route(
            "/members/:id",
            get(api::members::get_member)
                .put(api::members::update_member)
                .delete(api::members::delete_member),
        )
        .route("/members/:id/loans/export", get(api::members::export_member_loans))
        // Loans
        .route(
            "/loans",
            get(api::loans::list_loans).post(api::loans::create_loan),
        )
        .route(
            "/loans/:id",
            get(api::loans::get_loan)
                .put(api::loans::update_loan)
                .delete(api::loans::delete_loan),
        )
        .route("/loans/:id/return", post(api::loans::return_loan))
        // Reservations
        .route(
            "/reservations",
            get(api::reservations::list_reservations).post(api::reservations::create_reservation),
        )
        .route(
            "/reservations/:id",
            get(api::reservations::get_reservation)
                .put(api::reservations::update_reservation)
                .delete(api::reservations::delete_reservation),
        )
        // Self-service
        .route("/me/loans", get(api::me::my_loans))
        .route(
            "/me/reservations",
            get(api::me::my_reservations).post(api::me::reserve),
        )
        .route(
            "/me/reservations/:id",
            delete(api::me::cancel_reservation),
        )
        // Reports
        .route("/reports/current-loans", get(api::reports::current_loans))
        .route("/reports/overdue-loans", get(api::reports::overdue_loans))
        // Jobs
        .route("/jobs/overdue-scan", post(api::jobs::overdue_scan))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
