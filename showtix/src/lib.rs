//! # showtix: Cinema Booking Backend
//!
//! `showtix` is the booking backend for a single-screen cinema. It keeps the movie
//! catalog and showtime schedule, holds seats while customers pay, settles bookings
//! from payment gateway webhooks, and sends booking emails through background jobs.
//!
//! ## Overview
//!
//! `showtix` sits between a web frontend and three external services: a
//! TMDB-compatible movie metadata API, a payment gateway (Stripe), and an identity
//! provider that owns user accounts. The crate itself never renders HTML and never
//! sees credentials; a fronting proxy authenticates the browser session and forwards
//! the user's identity in a trusted header.
//!
//! The hard part of the domain is seat allocation: two customers racing for the same
//! seat must never both succeed, a customer who abandons checkout must not hold the
//! seat forever, and a payment that lands after the hold expired must be surfaced
//! rather than silently dropped. Everything else is conventional CRUD.
//!
//! ### What It Does
//!
//! When a customer books seats, the backend re-checks availability under a row lock
//! on the show, records an unpaid booking, marks the seats occupied, schedules a
//! release job for the end of the hold window, and hands back a checkout URL from the
//! payment gateway. The gateway's webhook later settles the booking and queues a
//! confirmation email. If the webhook never arrives, the release job frees the seats
//! again. Admins register shows (pulling movie details from the metadata API on first
//! use), and a reminder sweep emails ticket holders ahead of their showtime.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP
//! layer and uses PostgreSQL for all persistence, including the background job queue.
//!
//! ### Request Flow
//!
//! Client requests arrive under `/api/v1/*`. The [`api::models::users::CurrentUser`]
//! extractor resolves the proxy-injected identity header against the mirrored `users`
//! table; admin routes use [`auth::AdminUser`] on top, which checks the mirrored
//! `is_admin` flag. Handlers acquire a connection (or a transaction, where seat state
//! changes) from the shared pool and go through the repository layer for all queries.
//!
//! Webhook requests from external services arrive at the root, outside the client
//! API: `/webhooks/stripe` carries payment settlements and `/webhooks/identity`
//! carries user lifecycle events from the identity provider. Both verify an HMAC
//! signature before anything touches the database.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the client surface: shows and seat occupancy,
//! booking creation, the acting user's bookings and favorites, and the admin
//! dashboard. Request and response shapes live in [`api::models`], separate from the
//! database rows they are built from.
//!
//! The **database layer** ([`db`]) uses the repository pattern; each entity (movies,
//! shows, bookings, users, jobs) has a repository generic over the connection, so the
//! same code runs on a pool connection or inside a transaction. Seat occupancy is a
//! JSONB map on the show row, updated only under `SELECT ... FOR UPDATE`.
//!
//! **Background jobs** ([`jobs`]) run alongside the HTTP server: a worker that claims
//! due jobs from the `jobs` table with `FOR UPDATE SKIP LOCKED` (seat releases,
//! confirmation emails, new-show announcements) and a sweep that sends show reminders.
//! Jobs enqueued inside a transaction commit or roll back with it.
//!
//! **External clients** wrap the upstream services: [`movie_metadata`] for the
//! TMDB-compatible catalog API, [`payment_providers`] for checkout sessions and
//! webhook validation behind a provider trait, and [`email`] for SMTP (or file-based,
//! in development) delivery via lettre.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use showtix::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = showtix::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize structured logging
//!     showtix::telemetry::init_telemetry()?;
//!
//!     // Create and start the application
//!     let app = Application::new(config).await?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs migrations
//! on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! // Run migrations
//! showtix::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
//!
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod jobs;
pub mod movie_metadata;
mod openapi;
pub mod payment_providers;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod test;

use crate::{
    config::CorsOrigin, email::EmailService, jobs::JobQueue, movie_metadata::MovieMetadataClient, openapi::ApiDoc,
    payment_providers::PaymentProvider,
};
use axum::{
    http::{self, HeaderValue},
    routing::{get, post},
    Router,
};
use bon::Builder;
pub use config::Config;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{BookingId, JobId, MovieId, ShowId, UserId};

/// Application state shared across all request handlers.
///
/// Everything in here is cheap to clone: the pool and job queue are handles,
/// the external clients sit behind `Arc`.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from environment/files
/// - `metadata`: Client for the TMDB-compatible movie metadata API
/// - `payment`: Payment gateway behind the provider trait (Stripe or dummy)
/// - `jobs`: Handle for enqueueing background jobs
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .metadata(metadata)
///     .payment(payment)
///     .jobs(jobs)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub metadata: Arc<MovieMetadataClient>,
    pub payment: Arc<dyn PaymentProvider>,
    pub jobs: JobQueue,
}

/// Get the showtix database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to PostgreSQL with the configured pool settings and run migrations.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;

    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(settings.acquire_timeout_secs));

    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(std::time::Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(std::time::Duration::from_secs(settings.max_lifetime_secs));
    }

    let pool = options.connect(&config.database.url).await?;
    migrator().run(&pool).await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    let mut cors = CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([
            http::header::CONTENT_TYPE,
            config.auth.proxy_header.header_name.parse::<http::header::HeaderName>()?,
        ]);

    // tower-http rejects a literal "*" in an origin list, so the wildcard gets
    // its own arm. Config validation already forbids wildcard + credentials.
    let has_wildcard = cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard));
    if has_wildcard {
        cors = cors.allow_origin(tower_http::cors::Any);
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send bare origins, never the Url form with its
                // trailing slash
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        cors = cors.allow_origin(origins).allow_credentials(cors_config.allow_credentials);
    }

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// This constructs the complete Axum router with:
/// - Client API routes under `/api/v1`
/// - Webhook routes for the payment gateway and the identity provider
/// - Interactive API documentation at `/docs`
/// - CORS configuration
/// - Tracing middleware
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    // Client API routes
    let api_routes = Router::new()
        // Movie catalog and showtimes
        .route("/shows", get(api::handlers::shows::list_movies))
        .route("/shows", post(api::handlers::shows::add_shows))
        .route("/shows/now-playing", get(api::handlers::shows::now_playing))
        .route("/shows/{movie_id}", get(api::handlers::shows::movie_showtimes))
        .route("/shows/{show_id}/seats", get(api::handlers::shows::occupied_seats))
        // Bookings
        .route("/bookings", post(api::handlers::bookings::create_booking))
        // The acting user's resources
        .route("/users/me/bookings", get(api::handlers::users::my_bookings))
        .route("/users/me/favorites", get(api::handlers::users::list_favorites))
        .route("/users/me/favorites", post(api::handlers::users::toggle_favorite))
        // Admin surface
        .route("/admin/is-admin", get(api::handlers::admin::is_admin))
        .route("/admin/dashboard", get(api::handlers::admin::dashboard))
        .route("/admin/shows", get(api::handlers::admin::list_shows))
        .route("/admin/bookings", get(api::handlers::admin::list_bookings))
        .with_state(state.clone());

    let router = Router::new()
        .route("/health", get(|| async { "OK" }))
        // Webhook routes (external services, not part of client API docs)
        .route("/webhooks/stripe", post(api::handlers::payments::payment_webhook))
        .route("/webhooks/identity", post(api::handlers::identity::identity_webhook))
        .with_state(state.clone())
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer);

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Container for background tasks and their lifecycle management.
///
/// Two tasks run alongside the HTTP server: the job worker (seat releases,
/// confirmation emails, new-show announcements) and the reminder sweep.
///
/// # Graceful Shutdown
///
/// [`shutdown`](BackgroundServices::shutdown) cancels the shared token and waits
/// for the tasks to drain. When dropped instead, the `drop_guard` cancels the
/// token so the tasks stop on their next poll.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        // Signal all background tasks to shutdown
        self.shutdown_token.cancel();

        // Wait for all background tasks to complete
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Spawn the job worker and the reminder sweep.
fn setup_background_services(pool: PgPool, email: Arc<EmailService>, config: &Config) -> BackgroundServices {
    let shutdown_token = tokio_util::sync::CancellationToken::new();
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    let handle = tokio::spawn(jobs::run_job_worker(
        pool.clone(),
        email.clone(),
        config.jobs.clone(),
        shutdown_token.clone(),
    ));
    background_tasks.push(handle);

    let handle = tokio::spawn(jobs::run_reminder_sweep(pool, email, config.jobs.clone(), shutdown_token.clone()));
    background_tasks.push(handle);

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// The complete application: HTTP router, shared state, and background workers.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations,
///    constructs the external clients, and spawns background workers
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
/// 3. **Shutdown**: when the shutdown signal resolves, drains background tasks
///    and closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create the application on an existing pool.
    ///
    /// Tests hand in the pool provisioned by `#[sqlx::test]`; production callers
    /// use [`Application::new`], which connects from configuration. Migrations run
    /// in both paths.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting showtix with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        // External service clients
        let email = Arc::new(EmailService::new(&config)?);
        let metadata = Arc::new(MovieMetadataClient::new(&config.movie_metadata)?);
        let payment: Arc<dyn PaymentProvider> = Arc::from(payment_providers::create_provider(config.payment.clone()));

        let bg_services = setup_background_services(pool.clone(), email, &config);

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .metadata(metadata)
            .payment(payment)
            .jobs(JobQueue::new(pool.clone()))
            .build();

        let router = build_router(app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Showtix listening on http://{}, docs at http://localhost:{}/docs",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        // Close database connections
        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
