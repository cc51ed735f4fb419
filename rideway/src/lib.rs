//! # rideway: a ride-hailing backend
//!
//! `rideway` serves a rider app, a captain (driver) app and an admin dashboard from one process.
//! Riders get fare quotes and book rides; nearby captains of the requested vehicle type are told
//! about the ride over a WebSocket, one of them accepts it, starts it with the rider's OTP and
//! ends it, after which the rider pays and rates the trip.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses SQLite through `sqlx` for persistence.
//!
//! The **API layer** ([`api`]) exposes REST endpoints grouped by resource (`/user`, `/captain`,
//! `/ride`, `/map`, `/rating`, `/payment`, `/admin`) plus the realtime channel at `/ws`.
//!
//! The **authentication layer** ([`auth`]) issues JWT sessions carried in a cookie or bearer
//! header, keeps a blacklist of logged-out tokens, and verifies the single configured admin.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Ride status changes are
//! conditional updates, so two captains racing to accept a ride cannot both win.
//!
//! **Providers** sit behind traits so the service runs offline in development and tests: maps
//! (OpenStreetMap or a fixed gazetteer), payments (Razorpay or a local signer) and email (SMTP or
//! files).
//!
//! A **background task** purges expired token blacklist entries and spent reset tokens.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use rideway::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = rideway::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     rideway::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
mod email;
pub mod errors;
pub mod maps;
mod openapi;
pub mod payment_providers;
pub mod realtime;
pub mod rides;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::{str::FromStr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{self, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers,
    auth::admin::AdminCredentials,
    config::CorsOrigin,
    db::handlers::{BlacklistedTokens, PasswordResetTokens},
    maps::MapsProvider,
    openapi::ApiDoc,
    payment_providers::PaymentProvider,
    realtime::Hub,
};
pub use config::Config;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .maps(maps)
///     .payments(payments)
///     .hub(Hub::new())
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub maps: Arc<dyn MapsProvider>,
    pub payments: Arc<dyn PaymentProvider>,
    /// Live WebSocket connections by account
    pub hub: Hub,
    /// `None` when no admin is configured
    pub admin: Option<Arc<AdminCredentials>>,
}

/// Get the rideway database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the pool and bring the schema up to date.
async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let settings = &config.database.pool;
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout((settings.idle_timeout_secs > 0).then(|| Duration::from_secs(settings.idle_timeout_secs)))
        .max_lifetime((settings.max_lifetime_secs > 0).then(|| Duration::from_secs(settings.max_lifetime_secs)))
        .connect_with(options)
        .await?;

    migrator().run(&pool).await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Url keeps a trailing slash that browsers never send in Origin
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            http::header::AUTHORIZATION,
            http::header::CONTENT_TYPE,
            HeaderName::from_static("token"),
        ])
        .allow_credentials(config.auth.cors.allow_credentials);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Includes the REST API, the `/ws` upgrade, Scalar docs at `/docs`, CORS, request tracing and,
/// when enabled, Prometheus metrics at `/internal/metrics`.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let user_routes = Router::new()
        .route("/register", post(handlers::users::register))
        .route("/login", post(handlers::users::login))
        .route("/profile", get(handlers::users::profile))
        .route("/update", post(handlers::users::update))
        .route("/logout", get(handlers::users::logout))
        .route("/forgotpassword", post(handlers::users::forgot_password))
        .route("/resetpassword", post(handlers::users::reset_password))
        .route("/rides", get(handlers::users::rides))
        .route("/rides/rate", post(handlers::ratings::rate_ride))
        .route("/rides/{ride_id}/rate", post(handlers::ratings::rate_ride_by_id));

    let captain_routes = Router::new()
        .route("/register", post(handlers::captains::register))
        .route("/login", post(handlers::captains::login))
        .route("/profile", get(handlers::captains::profile))
        .route("/update", post(handlers::captains::update))
        .route("/logout", get(handlers::captains::logout))
        .route("/stats", get(handlers::captains::stats))
        .route("/forgotpassword", post(handlers::captains::forgot_password))
        .route("/resetpassword", post(handlers::captains::reset_password))
        .route("/rides", get(handlers::captains::rides));

    let ride_routes = Router::new()
        .route("/get-fare", get(handlers::rides::get_fare))
        .route("/create", post(handlers::rides::create))
        .route(
            "/cancel",
            get(handlers::rides::cancel_as_user).post(handlers::rides::cancel_as_captain),
        )
        .route("/confirm", post(handlers::rides::confirm))
        .route("/start-ride", get(handlers::rides::start))
        .route("/end-ride", post(handlers::rides::end))
        .route("/{ride_id}", get(handlers::rides::get));

    let map_routes = Router::new()
        .route("/get-coordinates", get(handlers::maps::get_coordinates))
        .route("/get-distance-time", get(handlers::maps::get_distance_time))
        .route("/get-suggestions", get(handlers::maps::get_suggestions));

    let payment_routes = Router::new()
        .route("/create-order", post(handlers::payments::create_order))
        .route("/verify-order", post(handlers::payments::verify_order));

    let admin_routes = Router::new()
        .route("/login", post(handlers::admin::login))
        .route("/dashboard", get(handlers::admin::dashboard))
        .route("/users", get(handlers::admin::list_users))
        .route("/captains", get(handlers::admin::list_captains))
        .route("/rides", get(handlers::admin::list_rides))
        .route("/rides/{id}", get(handlers::admin::get_ride))
        .route("/users/{id}/toggle-block", put(handlers::admin::toggle_user_block))
        .route("/captains/{id}/toggle-block", put(handlers::admin::toggle_captain_block));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/user", user_routes)
        .nest("/captain", captain_routes)
        .nest("/ride", ride_routes)
        .nest("/map", map_routes)
        .route("/rating/submit", post(handlers::ratings::submit))
        .nest("/payment", payment_routes)
        .nest("/admin", admin_routes)
        .route("/ws", get(handlers::socket::connect))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Remove blacklist entries for tokens that have expired anyway, and reset tokens that are used
/// or past their expiry.
async fn purge_tokens(pool: &SqlitePool) -> anyhow::Result<(u64, u64)> {
    let mut conn = pool.acquire().await?;
    let blacklisted = BlacklistedTokens::new(&mut conn).purge_expired().await?;
    let reset = PasswordResetTokens::new(&mut conn).purge_stale().await?;
    Ok((blacklisted, reset))
}

/// Container for background services and their lifecycle management.
///
/// When dropped, the `drop_guard` cancels the shutdown token, signaling all tasks to stop.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

fn setup_background_services(pool: SqlitePool, config: &Config, shutdown_token: CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    let cleanup = &config.background_services.token_cleanup;
    if cleanup.enabled {
        let interval = cleanup.interval;
        let token = shutdown_token.clone();
        let handle = tokio::spawn(async move {
            info!("Starting token cleanup every {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => match purge_tokens(&pool).await {
                        Ok((blacklisted, reset)) if blacklisted + reset > 0 => {
                            debug!("Purged {} blacklisted and {} reset tokens", blacklisted, reset);
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Token cleanup failed: {}", e),
                    },
                }
            }
        });
        background_tasks.push(handle);
    } else {
        info!("Token cleanup disabled");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] opens the database, runs migrations, builds the providers
///    and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, gracefully stops all services
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool).await
    }

    /// Create an application over an existing, migrated pool
    pub async fn new_with_pool(config: Config, pool: SqlitePool) -> anyhow::Result<Self> {
        debug!("Starting rideway with configuration: {:#?}", config);

        let maps = maps::create_provider(&config.maps)?;
        let payments: Arc<dyn PaymentProvider> = payment_providers::create_provider(config.payment.clone())?.into();
        let admin = AdminCredentials::from_config(&config).await?.map(Arc::new);
        if admin.is_none() {
            warn!("No admin credentials configured, the admin dashboard is unreachable");
        }

        let shutdown_token = CancellationToken::new();
        let bg_services = setup_background_services(pool.clone(), &config, shutdown_token);

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .maps(maps)
            .payments(payments)
            .hub(Hub::new())
            .maybe_admin(admin)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::builder()
            .http_transport()
            .build(self.router)
            .expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Rideway listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        auth::password::token_fingerprint,
        test_utils::{create_test_config, create_test_user, install_crypto_provider, token_for_user},
    };
    use axum::http::StatusCode;
    use chrono::{Duration as ChronoDuration, Utc};

    async fn test_app(pool: SqlitePool) -> (axum_test::TestServer, BackgroundServices) {
        install_crypto_provider();
        Application::new_with_pool(create_test_config(), pool)
            .await
            .expect("Failed to create application")
            .into_test_server()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_health_and_docs(pool: SqlitePool) {
        let (server, bg_services) = test_app(pool).await;

        server.get("/healthz").await.assert_text("OK");
        server.get("/docs").await.assert_status_ok();

        bg_services.shutdown().await;
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_full_stack_admin_login(pool: SqlitePool) {
        let (server, _bg_services) = test_app(pool.clone()).await;
        let user = create_test_user(&pool).await;

        let response = server
            .post("/admin/login")
            .json(&serde_json::json!({
                "email": crate::test_utils::TEST_ADMIN_EMAIL,
                "password": crate::test_utils::TEST_ADMIN_PASSWORD,
            }))
            .await;
        response.assert_status_ok();

        server
            .get("/user/profile")
            .authorization_bearer(token_for_user(&user, &create_test_config()))
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cors_preflight(pool: SqlitePool) {
        let (server, _bg_services) = test_app(pool).await;

        let response = server
            .method(Method::OPTIONS, "/user/login")
            .add_header("origin", "http://localhost:5173")
            .add_header("access-control-request-method", "POST")
            .add_header("access-control-request-headers", "content-type")
            .await;
        assert_eq!(
            response.header("access-control-allow-origin").to_str().unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(response.header("access-control-allow-credentials").to_str().unwrap(), "true");

        let response = server
            .method(Method::OPTIONS, "/user/profile")
            .add_header("origin", "http://localhost:5173")
            .add_header("access-control-request-method", "GET")
            .add_header("access-control-request-headers", "token")
            .await;
        let allowed = response.header("access-control-allow-headers").to_str().unwrap().to_ascii_lowercase();
        assert!(allowed.split(',').any(|h| h.trim() == "token"), "allowed headers: {allowed}");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_metrics_disabled_in_tests(pool: SqlitePool) {
        let (server, _bg_services) = test_app(pool).await;
        server.get("/internal/metrics").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_purge_tokens(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut blacklist = BlacklistedTokens::new(&mut conn);
        blacklist
            .add(&token_fingerprint("old"), Utc::now() - ChronoDuration::hours(1))
            .await
            .unwrap();
        blacklist
            .add(&token_fingerprint("live"), Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();
        drop(conn);

        let (blacklisted, _) = purge_tokens(&pool).await.unwrap();
        assert_eq!(blacklisted, 1);

        let mut conn = pool.acquire().await.unwrap();
        let mut blacklist = BlacklistedTokens::new(&mut conn);
        assert!(!blacklist.is_blacklisted(&token_fingerprint("old")).await.unwrap());
        assert!(blacklist.is_blacklisted(&token_fingerprint("live")).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_stops_on_shutdown() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let mut config = create_test_config();
        config.background_services.token_cleanup.enabled = true;
        config.background_services.token_cleanup.interval = std::time::Duration::from_secs(3600);

        let services = setup_background_services(pool, &config, CancellationToken::new());
        assert_eq!(services.background_tasks.len(), 1);
        // Tables are missing here, so the first purge fails and is only logged
        tokio::time::timeout(std::time::Duration::from_secs(5), services.shutdown())
            .await
            .expect("cleanup task should stop when cancelled");
    }
}
