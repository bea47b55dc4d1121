//! End-to-end tests driving the HTTP surface against a real database,
//! with the external providers mocked or stubbed out.

use crate::{
    api::models::{
        admin::DashboardResponse,
        bookings::{AdminBookingResponse, BookingCreateResponse, BookingWithShowResponse},
        movies::{MovieResponse, NowPlayingMovie},
        shows::{MovieShowtimesResponse, OccupiedSeatsResponse, ShowResponse, ShowWithMovieResponse},
        users::{FavoriteToggleResponse, IsAdminResponse},
    },
    config::{PaymentConfig, StripeConfig},
    db::handlers::{Bookings, Repository, Users},
    test_utils::{
        IDENTITY_WEBHOOK_TEST_SECRET, add_auth_headers, create_test_app, create_test_app_with_config,
        create_test_config, create_test_movie, create_test_show, create_test_user,
    },
};
use axum_test::TestServer;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::Duration;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

async fn count_jobs(pool: &PgPool, job_type: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE job_type = $1")
        .bind(job_type)
        .fetch_one(pool)
        .await
        .expect("Failed to count jobs")
}

#[sqlx::test]
#[test_log::test]
async fn test_health_and_docs_are_served(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool).await;

    let health = server.get("/health").await;
    assert_eq!(health.status_code(), 200);
    assert_eq!(health.text(), "OK");

    let docs = server.get("/docs").await;
    assert_eq!(docs.status_code(), 200, "API docs page should be served");
}

/// End-to-end integration test: the full booking journey with the dummy
/// payment gateway. Browse the catalog, pick a show, book seats, and see the
/// booking under "my bookings" with its seats held on the show.
#[sqlx::test]
#[test_log::test]
async fn test_e2e_booking_flow_with_dummy_checkout(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let user = create_test_user(&pool, false).await;
    let headers = add_auth_headers(&user);

    let movie = create_test_movie(&pool, 603).await;
    let show = create_test_show(&pool, movie.id, Duration::hours(48), Decimal::new(1250, 2)).await;

    // Step 1: The public catalog lists the movie
    let catalog_response = server.get("/api/v1/shows").await;
    assert_eq!(catalog_response.status_code(), 200);
    let catalog: Vec<MovieResponse> = catalog_response.json();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].title, "The Matrix");

    // Step 2: The movie page groups its upcoming shows by date
    let showtimes_response = server.get("/api/v1/shows/603").await;
    assert_eq!(showtimes_response.status_code(), 200);
    let showtimes: MovieShowtimesResponse = showtimes_response.json();
    assert_eq!(showtimes.movie.id, 603);
    let shows_on_date = &showtimes.showtimes[&show.start_time.date_naive()];
    assert_eq!(shows_on_date.len(), 1);
    assert_eq!(shows_on_date[0].id, show.id);

    // Step 3: Book two seats
    let booking_response = server
        .post("/api/v1/bookings")
        .add_header(&headers[0].0, &headers[0].1)
        .json(&serde_json::json!({
            "show_id": show.id,
            "seats": ["A1", "A2"],
        }))
        .await;
    assert_eq!(booking_response.status_code(), 201, "Failed to create booking");
    let booking: BookingCreateResponse = booking_response.json();

    // The dummy gateway redirects straight to the success URL
    assert!(
        booking.payment_link.contains("payment=success"),
        "Dummy checkout link should redirect to the success page, got {}",
        booking.payment_link
    );
    assert!(
        booking.payment_link.contains("session_id=dummy_session_"),
        "Dummy checkout link should carry a traceable session id, got {}",
        booking.payment_link
    );

    // Step 4: The seat map shows both seats as taken
    let seats_response = server.get(&format!("/api/v1/shows/{}/seats", show.id)).await;
    assert_eq!(seats_response.status_code(), 200);
    let seats: OccupiedSeatsResponse = seats_response.json();
    assert_eq!(seats.occupied_seats, vec!["A1".to_string(), "A2".to_string()]);

    // Step 5: The booking row charges per seat and is still unpaid
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let stored = Bookings::new(&mut conn)
        .get_by_id(booking.booking_id)
        .await
        .expect("Failed to load booking")
        .expect("Booking should exist");
    assert_eq!(stored.amount, Decimal::new(2500, 2));
    assert!(!stored.is_paid);
    assert_eq!(stored.payment_link, booking.payment_link);

    // Step 6: The seat hold scheduled its own expiry
    assert_eq!(count_jobs(&pool, "release_booking").await, 1);

    // Step 7: "My bookings" returns the booking with its show and movie
    let mine_response = server
        .get("/api/v1/users/me/bookings")
        .add_header(&headers[0].0, &headers[0].1)
        .await;
    assert_eq!(mine_response.status_code(), 200);
    let mine: Vec<BookingWithShowResponse> = mine_response.json();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, booking.booking_id);
    assert_eq!(mine[0].seats, vec!["A1".to_string(), "A2".to_string()]);
    assert_eq!(mine[0].show.id, show.id);
    assert_eq!(mine[0].movie.title, "The Matrix");
    assert!(!mine[0].is_paid);
}

#[sqlx::test]
#[test_log::test]
async fn test_booking_conflict_lists_taken_seats(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let first = create_test_user(&pool, false).await;
    let second = create_test_user(&pool, false).await;
    let movie = create_test_movie(&pool, 603).await;
    let show = create_test_show(&pool, movie.id, Duration::hours(24), Decimal::new(1000, 2)).await;

    let response = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &first.id)
        .json(&serde_json::json!({"show_id": show.id, "seats": ["A1", "A2"]}))
        .await;
    assert_eq!(response.status_code(), 201);

    // Overlap on A2; B5 is still free and must not appear in the conflict
    let conflict = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &second.id)
        .json(&serde_json::json!({"show_id": show.id, "seats": ["A2", "B5"]}))
        .await;
    assert_eq!(conflict.status_code(), 409, "Overlapping booking should conflict");

    let body: serde_json::Value = conflict.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["seats"], serde_json::json!(["A2"]));

    // The loser holds nothing
    let seats_response = server.get(&format!("/api/v1/shows/{}/seats", show.id)).await;
    let seats: OccupiedSeatsResponse = seats_response.json();
    assert_eq!(seats.occupied_seats, vec!["A1".to_string(), "A2".to_string()]);
}

#[sqlx::test]
#[test_log::test]
async fn test_concurrent_bookings_for_same_seat_one_wins(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let first = create_test_user(&pool, false).await;
    let second = create_test_user(&pool, false).await;
    let movie = create_test_movie(&pool, 603).await;
    let show = create_test_show(&pool, movie.id, Duration::hours(24), Decimal::new(1000, 2)).await;

    let body = serde_json::json!({"show_id": show.id, "seats": ["C4"]});
    let (a, b) = tokio::join!(
        async {
            server
                .post("/api/v1/bookings")
                .add_header("x-showtix-user", &first.id)
                .json(&body)
                .await
        },
        async {
            server
                .post("/api/v1/bookings")
                .add_header("x-showtix-user", &second.id)
                .json(&body)
                .await
        },
    );

    let mut statuses = [a.status_code().as_u16(), b.status_code().as_u16()];
    statuses.sort();
    assert_eq!(statuses, [201, 409], "Exactly one of two racing bookings should win");

    let bookings = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
        .fetch_one(&pool)
        .await
        .expect("Failed to count bookings");
    assert_eq!(bookings, 1);
}

#[sqlx::test]
#[test_log::test]
async fn test_booking_validation_and_authentication(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let user = create_test_user(&pool, false).await;
    let movie = create_test_movie(&pool, 603).await;
    let show = create_test_show(&pool, movie.id, Duration::hours(24), Decimal::new(1000, 2)).await;

    // No identity header
    let response = server
        .post("/api/v1/bookings")
        .json(&serde_json::json!({"show_id": show.id, "seats": ["A1"]}))
        .await;
    assert_eq!(response.status_code(), 401);

    // Identity header naming a user that was never mirrored in
    let response = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", "user_never_synced")
        .json(&serde_json::json!({"show_id": show.id, "seats": ["A1"]}))
        .await;
    assert_eq!(response.status_code(), 401);

    // Empty seat list
    let response = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &user.id)
        .json(&serde_json::json!({"show_id": show.id, "seats": []}))
        .await;
    assert_eq!(response.status_code(), 400);

    // Duplicate seat labels
    let response = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &user.id)
        .json(&serde_json::json!({"show_id": show.id, "seats": ["A1", "A1"]}))
        .await;
    assert_eq!(response.status_code(), 400);

    // A show that does not exist reads as every seat taken
    let response = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &user.id)
        .json(&serde_json::json!({"show_id": Uuid::new_v4(), "seats": ["A1", "A2"]}))
        .await;
    assert_eq!(response.status_code(), 409);
    let body: serde_json::Value = response.json();
    assert_eq!(body["seats"], serde_json::json!(["A1", "A2"]));

    // Nothing was held on the real show
    let seats_response = server.get(&format!("/api/v1/shows/{}/seats", show.id)).await;
    let seats: OccupiedSeatsResponse = seats_response.json();
    assert!(seats.occupied_seats.is_empty());
}

/// An unpaid booking's seats come back once the release window lapses, and
/// the seat can be booked again.
#[sqlx::test]
#[test_log::test]
async fn test_release_job_frees_held_seats_for_rebooking(pool: PgPool) {
    let mut config = create_test_config();
    config.booking.release_window = std::time::Duration::from_millis(50);
    config.jobs.poll_interval = std::time::Duration::from_millis(25);
    let (server, _bg_services) = create_test_app_with_config(pool.clone(), config).await;

    let first = create_test_user(&pool, false).await;
    let second = create_test_user(&pool, false).await;
    let movie = create_test_movie(&pool, 603).await;
    let show = create_test_show(&pool, movie.id, Duration::hours(24), Decimal::new(1000, 2)).await;

    let response = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &first.id)
        .json(&serde_json::json!({"show_id": show.id, "seats": ["D1"]}))
        .await;
    assert_eq!(response.status_code(), 201);

    // Poll until the worker releases the hold
    let mut freed = false;
    for _ in 0..200 {
        let seats: OccupiedSeatsResponse = server.get(&format!("/api/v1/shows/{}/seats", show.id)).await.json();
        if seats.occupied_seats.is_empty() {
            freed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert!(freed, "Seat hold should be released once the window lapses");

    // Released bookings are deleted outright, not kept around
    let mine: Vec<BookingWithShowResponse> = server
        .get("/api/v1/users/me/bookings")
        .add_header("x-showtix-user", &first.id)
        .await
        .json();
    assert!(mine.is_empty());

    // The job row settles as completed shortly after the seats free up
    let mut completed = false;
    for _ in 0..200 {
        let status: String = sqlx::query_scalar("SELECT status FROM jobs WHERE job_type = 'release_booking'")
            .fetch_one(&pool)
            .await
            .expect("Failed to read job status");
        if status == "completed" {
            completed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert!(completed, "Release job should be marked completed");

    // The freed seat can be booked again
    let rebook = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &second.id)
        .json(&serde_json::json!({"show_id": show.id, "seats": ["D1"]}))
        .await;
    assert_eq!(rebook.status_code(), 201, "Released seat should be bookable again");
}

#[sqlx::test]
#[test_log::test]
async fn test_favorites_toggle_and_listing(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let user = create_test_user(&pool, false).await;
    create_test_movie(&pool, 603).await;

    let toggle = server
        .post("/api/v1/users/me/favorites")
        .add_header("x-showtix-user", &user.id)
        .json(&serde_json::json!({"movie_id": 603}))
        .await;
    assert_eq!(toggle.status_code(), 200);
    let state: FavoriteToggleResponse = toggle.json();
    assert!(state.favorited);

    let favorites: Vec<MovieResponse> = server
        .get("/api/v1/users/me/favorites")
        .add_header("x-showtix-user", &user.id)
        .await
        .json();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].title, "The Matrix");

    // Toggling again removes it
    let toggle = server
        .post("/api/v1/users/me/favorites")
        .add_header("x-showtix-user", &user.id)
        .json(&serde_json::json!({"movie_id": 603}))
        .await;
    let state: FavoriteToggleResponse = toggle.json();
    assert!(!state.favorited);

    let favorites: Vec<MovieResponse> = server
        .get("/api/v1/users/me/favorites")
        .add_header("x-showtix-user", &user.id)
        .await
        .json();
    assert!(favorites.is_empty());

    // Unknown movies 404 instead of creating a dangling favorite
    let toggle = server
        .post("/api/v1/users/me/favorites")
        .add_header("x-showtix-user", &user.id)
        .json(&serde_json::json!({"movie_id": 999_999}))
        .await;
    assert_eq!(toggle.status_code(), 404);
}

#[sqlx::test]
#[test_log::test]
async fn test_admin_routes_require_the_admin_role(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let user = create_test_user(&pool, false).await;
    let admin = create_test_user(&pool, true).await;

    let probe: IsAdminResponse = server
        .get("/api/v1/admin/is-admin")
        .add_header("x-showtix-user", &user.id)
        .await
        .json();
    assert!(!probe.is_admin);

    let probe: IsAdminResponse = server
        .get("/api/v1/admin/is-admin")
        .add_header("x-showtix-user", &admin.id)
        .await
        .json();
    assert!(probe.is_admin);

    // Non-admins are rejected from every back-office route
    for path in [
        "/api/v1/admin/dashboard",
        "/api/v1/admin/shows",
        "/api/v1/admin/bookings",
        "/api/v1/shows/now-playing",
    ] {
        let response = server.get(path).add_header("x-showtix-user", &user.id).await;
        assert_eq!(response.status_code(), 403, "{path} should be admin-only");
    }

    let response = server
        .post("/api/v1/shows")
        .add_header("x-showtix-user", &user.id)
        .json(&serde_json::json!({"movie_id": 603, "shows": [], "price": "10.00"}))
        .await;
    assert_eq!(response.status_code(), 403);

    // Unauthenticated callers get 401, not 403
    let response = server.get("/api/v1/admin/dashboard").await;
    assert_eq!(response.status_code(), 401);
}

#[sqlx::test]
#[test_log::test]
async fn test_admin_dashboard_reflects_settled_bookings(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let admin = create_test_user(&pool, true).await;
    let alice = create_test_user(&pool, false).await;
    let bob = create_test_user(&pool, false).await;
    let movie = create_test_movie(&pool, 603).await;
    let show = create_test_show(&pool, movie.id, Duration::hours(24), Decimal::new(1000, 2)).await;
    let later = create_test_show(&pool, movie.id, Duration::hours(72), Decimal::new(1000, 2)).await;

    let paid: BookingCreateResponse = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &alice.id)
        .json(&serde_json::json!({"show_id": show.id, "seats": ["A1", "A2"]}))
        .await
        .json();
    let unpaid: BookingCreateResponse = server
        .post("/api/v1/bookings")
        .add_header("x-showtix-user", &bob.id)
        .json(&serde_json::json!({"show_id": later.id, "seats": ["B1"]}))
        .await
        .json();

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Bookings::new(&mut conn)
        .mark_paid(paid.booking_id)
        .await
        .expect("Failed to mark booking paid");

    // Only the settled booking counts towards the totals
    let dashboard: DashboardResponse = server
        .get("/api/v1/admin/dashboard")
        .add_header("x-showtix-user", &admin.id)
        .await
        .json();
    assert_eq!(dashboard.total_bookings, 1);
    assert_eq!(dashboard.total_revenue, Decimal::new(2000, 2));
    assert_eq!(dashboard.total_users, 3);
    assert_eq!(dashboard.active_shows.len(), 2);

    let shows: Vec<ShowWithMovieResponse> = server
        .get("/api/v1/admin/shows")
        .add_header("x-showtix-user", &admin.id)
        .await
        .json();
    assert_eq!(shows.len(), 2);
    let booked = shows.iter().find(|s| s.id == show.id).expect("Show should be listed");
    assert_eq!(booked.occupied_seats, vec!["A1".to_string(), "A2".to_string()]);
    assert_eq!(booked.movie.id, 603);

    let bookings: Vec<AdminBookingResponse> = server
        .get("/api/v1/admin/bookings")
        .add_header("x-showtix-user", &admin.id)
        .await
        .json();
    assert_eq!(bookings.len(), 2);
    let settled = bookings
        .iter()
        .find(|b| b.id == paid.booking_id)
        .expect("Paid booking should be listed");
    assert!(settled.is_paid);
    assert_eq!(settled.user.id, alice.id);
    assert!(bookings.iter().any(|b| b.id == unpaid.booking_id && !b.is_paid));
}

/// Scheduling shows for a movie the catalog has never seen fetches its
/// details and credits from the metadata provider exactly once.
#[sqlx::test]
#[test_log::test]
async fn test_add_shows_caches_movie_metadata(pool: PgPool) {
    let mock_server = wiremock::MockServer::start().await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/movie/603"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 603,
            "title": "The Matrix",
            "overview": "A computer hacker learns about the true nature of reality.",
            "poster_path": "/matrix.jpg",
            "backdrop_path": "/matrix_backdrop.jpg",
            "release_date": "1999-03-31",
            "original_language": "en",
            "tagline": "Free your mind",
            "genres": [{"id": 878, "name": "Science Fiction"}],
            "vote_average": 8.2,
            "runtime": 136
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/movie/603/credits"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cast": [
                {"name": "Keanu Reeves", "profile_path": "/keanu.jpg"},
                {"name": "Carrie-Anne Moss", "profile_path": null}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.movie_metadata.base_url = url::Url::parse(&mock_server.uri()).expect("Mock server URI should parse");
    let (server, _bg_services) = create_test_app_with_config(pool.clone(), config).await;

    let admin = create_test_user(&pool, true).await;

    let response = server
        .post("/api/v1/shows")
        .add_header("x-showtix-user", &admin.id)
        .json(&serde_json::json!({
            "movie_id": 603,
            "shows": [{"date": "2031-07-04", "times": ["19:30", "21:45"]}],
            "price": "10.00",
        }))
        .await;
    assert_eq!(response.status_code(), 201, "Failed to register shows");
    let created: Vec<ShowResponse> = response.json();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|s| s.movie_id == 603 && s.price == Decimal::new(1000, 2)));

    // The movie landed in the local catalog with the provider's data
    let catalog: Vec<MovieResponse> = server.get("/api/v1/shows").await.json();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].title, "The Matrix");
    assert_eq!(catalog[0].runtime, 136);
    assert_eq!(catalog[0].casts.len(), 2);

    // Announcing the new shows is queued for the background worker
    assert_eq!(count_jobs(&pool, "new_show_broadcast").await, 1);

    // A second batch for the same movie reuses the cached row; the expect(1)
    // on the mocks verifies the provider is not called again
    let response = server
        .post("/api/v1/shows")
        .add_header("x-showtix-user", &admin.id)
        .json(&serde_json::json!({
            "movie_id": 603,
            "shows": [{"date": "2031-07-05", "times": ["19:30"]}],
            "price": "11.00",
        }))
        .await;
    assert_eq!(response.status_code(), 201);

    // Malformed times never reach the provider or the database
    let response = server
        .post("/api/v1/shows")
        .add_header("x-showtix-user", &admin.id)
        .json(&serde_json::json!({
            "movie_id": 603,
            "shows": [{"date": "2031-07-06", "times": ["late evening"]}],
            "price": "10.00",
        }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[sqlx::test]
#[test_log::test]
async fn test_now_playing_proxies_the_metadata_provider(pool: PgPool) {
    let mock_server = wiremock::MockServer::start().await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/movie/now_playing"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "page": 1,
            "results": [
                {"id": 603, "title": "The Matrix", "vote_average": 8.2},
                {"id": 157336, "title": "Interstellar", "release_date": "2014-11-05"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.movie_metadata.base_url = url::Url::parse(&mock_server.uri()).expect("Mock server URI should parse");
    let (server, _bg_services) = create_test_app_with_config(pool.clone(), config).await;

    let admin = create_test_user(&pool, true).await;

    let response = server
        .get("/api/v1/shows/now-playing")
        .add_header("x-showtix-user", &admin.id)
        .await;
    assert_eq!(response.status_code(), 200);
    let movies: Vec<NowPlayingMovie> = response.json();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[0].title, "The Matrix");
}

type HmacSha256 = Hmac<sha2::Sha256>;

/// Sign a payload the way the identity provider does: base64 HMAC-SHA256
/// over `{msg_id}.{timestamp}.{body}`, keyed with the `whsec_` secret.
fn identity_signature(msg_id: &str, timestamp: &str, body: &str) -> String {
    let encoded_secret = IDENTITY_WEBHOOK_TEST_SECRET
        .strip_prefix("whsec_")
        .expect("Test secret should carry the whsec_ prefix");
    let key = BASE64_STANDARD.decode(encoded_secret).expect("Test secret should be base64");

    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC accepts any key length");
    mac.update(format!("{msg_id}.{timestamp}.{body}").as_bytes());

    format!("v1,{}", BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

async fn post_identity_event(server: &TestServer, msg_id: &str, event: &serde_json::Value) -> axum_test::TestResponse {
    let payload = event.to_string();
    server
        .post("/webhooks/identity")
        .add_header("svix-id", msg_id)
        .add_header("svix-timestamp", "1614265330")
        .add_header("svix-signature", identity_signature(msg_id, "1614265330", &payload))
        .text(payload)
        .await
}

#[sqlx::test]
#[test_log::test]
async fn test_identity_webhook_mirrors_user_lifecycle(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    // user.created mirrors the user in
    let response = post_identity_event(
        &server,
        "msg_1",
        &serde_json::json!({
            "type": "user.created",
            "data": {
                "id": "user_e2e_1",
                "first_name": "Trinity",
                "last_name": "Moss",
                "image_url": "https://img.example.com/trinity.png",
                "email_addresses": [{"email_address": "trinity@example.com"}],
                "private_metadata": {}
            }
        }),
    )
    .await;
    assert_eq!(response.status_code(), 200, "Signed user.created should be accepted");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let user = Users::new(&mut conn)
        .get_by_id("user_e2e_1".to_string())
        .await
        .expect("Failed to load user")
        .expect("User should be mirrored in");
    assert_eq!(user.name, "Trinity Moss");
    assert_eq!(user.email, "trinity@example.com");
    assert!(!user.is_admin);

    // user.updated overwrites the mirror, including the admin role from
    // private metadata
    let response = post_identity_event(
        &server,
        "msg_2",
        &serde_json::json!({
            "type": "user.updated",
            "data": {
                "id": "user_e2e_1",
                "first_name": "Trinity",
                "last_name": "Anderson",
                "email_addresses": [{"email_address": "trinity@example.com"}],
                "private_metadata": {"role": "admin"}
            }
        }),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let user = Users::new(&mut conn)
        .get_by_id("user_e2e_1".to_string())
        .await
        .expect("Failed to load user")
        .expect("User should still exist");
    assert_eq!(user.name, "Trinity Anderson");
    assert!(user.is_admin);

    // Unknown event types are acknowledged without touching anything
    let response = post_identity_event(
        &server,
        "msg_3",
        &serde_json::json!({"type": "session.created", "data": {"id": "sess_1"}}),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    // user.deleted removes the mirror
    let response = post_identity_event(
        &server,
        "msg_4",
        &serde_json::json!({"type": "user.deleted", "data": {"id": "user_e2e_1"}}),
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let user = Users::new(&mut conn)
        .get_by_id("user_e2e_1".to_string())
        .await
        .expect("Failed to load user");
    assert!(user.is_none(), "Deleted user should be gone");
}

#[sqlx::test]
#[test_log::test]
async fn test_identity_webhook_rejects_bad_signatures(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool.clone()).await;

    let event = serde_json::json!({
        "type": "user.created",
        "data": {
            "id": "user_forged",
            "email_addresses": [{"email_address": "forged@example.com"}]
        }
    });
    let payload = event.to_string();

    // Valid signature for different content
    let response = server
        .post("/webhooks/identity")
        .add_header("svix-id", "msg_1")
        .add_header("svix-timestamp", "1614265330")
        .add_header("svix-signature", identity_signature("msg_1", "1614265330", "other content"))
        .text(payload.clone())
        .await;
    assert_eq!(response.status_code(), 400);

    // Missing signature header entirely
    let response = server
        .post("/webhooks/identity")
        .add_header("svix-id", "msg_1")
        .add_header("svix-timestamp", "1614265330")
        .text(payload.clone())
        .await;
    assert_eq!(response.status_code(), 400);

    // Neither attempt mirrored the user
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let user = Users::new(&mut conn)
        .get_by_id("user_forged".to_string())
        .await
        .expect("Failed to load user");
    assert!(user.is_none(), "Forged events must not create users");

    // A created event without any email address is rejected as malformed
    let response = post_identity_event(
        &server,
        "msg_5",
        &serde_json::json!({"type": "user.created", "data": {"id": "user_no_email"}}),
    )
    .await;
    assert_eq!(response.status_code(), 400);
}

#[sqlx::test]
#[test_log::test]
async fn test_identity_webhook_requires_configured_secret(pool: PgPool) {
    let mut config = create_test_config();
    config.auth.identity_webhook_secret = None;
    let (server, _bg_services) = create_test_app_with_config(pool, config).await;

    let response = server
        .post("/webhooks/identity")
        .add_header("svix-id", "msg_1")
        .add_header("svix-timestamp", "1614265330")
        .add_header("svix-signature", "v1,abc")
        .text("{}")
        .await;
    assert_eq!(response.status_code(), 501);
}

#[sqlx::test]
#[test_log::test]
async fn test_stripe_webhook_rejects_invalid_signatures(pool: PgPool) {
    let mut config = create_test_config();
    config.payment = PaymentConfig::Stripe(StripeConfig {
        api_key: "sk_test_unused".to_string(),
        webhook_secret: "whsec_stripe_test_secret".to_string(),
        currency: "usd".to_string(),
    });
    let (server, _bg_services) = create_test_app_with_config(pool.clone(), config).await;

    let user = create_test_user(&pool, false).await;
    let movie = create_test_movie(&pool, 603).await;
    let show = create_test_show(&pool, movie.id, Duration::hours(24), Decimal::new(1000, 2)).await;
    let booking = crate::test_utils::create_test_booking(&pool, &user.id, show.id, &["A1"]).await;

    let body = serde_json::json!({"type": "checkout.session.completed"}).to_string();

    let response = server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", "t=1614265330,v1=deadbeef")
        .text(body.clone())
        .await;
    assert_eq!(response.status_code(), 400, "Forged signature should be rejected");

    let response = server.post("/webhooks/stripe").text(body).await;
    assert_eq!(response.status_code(), 400, "Missing signature should be rejected");

    // Nothing settled
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let stored = Bookings::new(&mut conn)
        .get_by_id(booking.id)
        .await
        .expect("Failed to load booking")
        .expect("Booking should still exist");
    assert!(!stored.is_paid, "Rejected webhooks must not settle bookings");
    assert_eq!(count_jobs(&pool, "confirmation_email").await, 0);
}

#[sqlx::test]
#[test_log::test]
async fn test_payment_webhook_acks_when_provider_has_no_channel(pool: PgPool) {
    let (server, _bg_services) = create_test_app(pool).await;

    // The dummy gateway validates nothing and reports nothing to settle
    let response = server.post("/webhooks/stripe").text("{}").await;
    assert_eq!(response.status_code(), 200);
}
