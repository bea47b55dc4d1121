//! Test utilities for integration testing (available with `test-utils` feature).

use crate::config::{EmailTransportConfig, JobsConfig, PoolSettings, ProxyHeaderAuthConfig};
use crate::db::handlers::{Bookings, Movies, Repository, Shows, Users};
use crate::db::models::{
    bookings::{BookingCreateDBRequest, BookingDBResponse},
    movies::{MovieCreateDBRequest, MovieDBResponse},
    shows::{ShowCreateDBRequest, ShowDBResponse},
    users::{UserDBResponse, UserUpsertDBRequest},
};
use crate::{
    api::models::movies::{CastMember, Genre},
    jobs::JobQueue,
    types::{MovieId, ShowId, UserId},
};
use axum_test::TestServer;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Signing secret the test config wires into the identity webhook endpoint.
pub const IDENTITY_WEBHOOK_TEST_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

pub async fn create_test_app(pool: PgPool) -> (TestServer, crate::BackgroundServices) {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: crate::config::Config) -> (TestServer, crate::BackgroundServices) {
    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> crate::config::Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("showtix-test-emails-{}", std::process::id()));

    crate::config::Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: crate::config::DatabaseConfig {
            // Tests run on the pool provisioned by #[sqlx::test]; this URL is
            // never dialled
            url: "postgresql://unused".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
        },
        auth: crate::config::AuthConfig {
            proxy_header: ProxyHeaderAuthConfig::default(),
            identity_webhook_secret: Some(IDENTITY_WEBHOOK_TEST_SECRET.to_string()),
            cors: crate::config::CorsConfig::default(),
        },
        jobs: JobsConfig {
            poll_interval: std::time::Duration::from_millis(50),
            ..Default::default()
        },
        email: crate::config::EmailConfig {
            transport: EmailTransportConfig::File {
                path: temp_dir.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn create_test_email_service() -> crate::email::EmailService {
    // Each service gets its own directory so parallel tests don't share mailboxes
    let temp_dir = std::env::temp_dir().join(format!("showtix-test-emails-{}", Uuid::new_v4().simple()));

    let mut config = create_test_config();
    config.email.transport = EmailTransportConfig::File {
        path: temp_dir.to_string_lossy().to_string(),
    };

    crate::email::EmailService::new(&config).expect("Failed to create email service")
}

pub fn create_test_state(pool: &PgPool) -> crate::AppState {
    let config = create_test_config();

    let metadata = crate::movie_metadata::MovieMetadataClient::new(&config.movie_metadata).expect("Failed to create metadata client");
    let payment: Arc<dyn crate::payment_providers::PaymentProvider> =
        Arc::from(crate::payment_providers::create_provider(config.payment.clone()));

    crate::AppState::builder()
        .db(pool.clone())
        .config(config)
        .metadata(Arc::new(metadata))
        .payment(payment)
        .jobs(JobQueue::new(pool.clone()))
        .build()
}

pub async fn create_test_user(pool: &PgPool, is_admin: bool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let user_id = format!("user_{}", Uuid::new_v4().simple());

    let upsert = UserUpsertDBRequest {
        id: user_id.clone(),
        name: "Test User".to_string(),
        email: format!("{user_id}@example.com"),
        image: None,
        is_admin,
    };

    users_repo.create(&upsert).await.expect("Failed to create test user")
}

pub async fn create_test_movie(pool: &PgPool, id: MovieId) -> MovieDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut movies_repo = Movies::new(&mut conn);

    let create = MovieCreateDBRequest {
        id,
        title: "The Matrix".to_string(),
        overview: "A computer hacker learns the true nature of reality.".to_string(),
        poster_path: Some("/matrix.jpg".to_string()),
        backdrop_path: None,
        release_date: NaiveDate::from_ymd_opt(1999, 3, 31),
        original_language: Some("en".to_string()),
        tagline: Some("Free your mind".to_string()),
        genres: vec![Genre {
            id: 878,
            name: "Science Fiction".to_string(),
        }],
        casts: vec![CastMember {
            name: "Keanu Reeves".to_string(),
            profile_path: None,
        }],
        vote_average: 8.2,
        runtime: 136,
    };

    movies_repo.create(&create).await.expect("Failed to create test movie")
}

pub async fn create_test_show(pool: &PgPool, movie_id: MovieId, starts_in: Duration, price: Decimal) -> ShowDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut shows_repo = Shows::new(&mut conn);

    let create = ShowCreateDBRequest {
        movie_id,
        start_time: Utc::now() + starts_in,
        price,
    };

    shows_repo.create(&create).await.expect("Failed to create test show")
}

/// Create an unpaid booking and mark its seats occupied on the show, the same
/// two writes the booking endpoint commits together.
pub async fn create_test_booking(pool: &PgPool, user_id: &UserId, show_id: ShowId, seats: &[&str]) -> BookingDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let seats: Vec<String> = seats.iter().map(|s| s.to_string()).collect();

    let mut shows_repo = Shows::new(&mut conn);
    let show = shows_repo
        .get_by_id(show_id)
        .await
        .expect("Failed to load show")
        .expect("Show must exist before booking");

    let mut occupied = show.occupied_seats.0.clone();
    for seat in &seats {
        occupied.insert(seat.clone(), user_id.clone());
    }
    shows_repo.set_occupied_seats(show_id, &occupied).await.expect("Failed to occupy seats");

    let create = BookingCreateDBRequest {
        user_id: user_id.clone(),
        show_id,
        amount: show.price * Decimal::from(seats.len()),
        seats,
    };

    Bookings::new(&mut conn).create(&create).await.expect("Failed to create test booking")
}

pub fn add_auth_headers(user: &UserDBResponse) -> Vec<(String, String)> {
    let config = ProxyHeaderAuthConfig::default();
    vec![(config.header_name, user.id.clone())]
}
