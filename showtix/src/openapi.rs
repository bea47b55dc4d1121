//! OpenAPI documentation for the client API at `/api/v1/*`.
//!
//! The webhook endpoints (`/webhooks/stripe`, `/webhooks/identity`) are
//! called by external services and are not part of the client API docs.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Security scheme for the client API: the trusted proxy header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-Showtix-User".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-showtix-user",
                    "Identity-provider user id injected by the authenticating proxy. \
                     Requests reaching the API directly must set it themselves.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Client API server")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Catalog and showtimes
        api::handlers::shows::now_playing,
        api::handlers::shows::add_shows,
        api::handlers::shows::list_movies,
        api::handlers::shows::movie_showtimes,
        api::handlers::shows::occupied_seats,
        // Bookings
        api::handlers::bookings::create_booking,
        // The caller's own data
        api::handlers::users::my_bookings,
        api::handlers::users::toggle_favorite,
        api::handlers::users::list_favorites,
        // Back office
        api::handlers::admin::is_admin,
        api::handlers::admin::dashboard,
        api::handlers::admin::list_shows,
        api::handlers::admin::list_bookings,
    ),
    components(
        schemas(
            api::models::movies::Genre,
            api::models::movies::CastMember,
            api::models::movies::MovieResponse,
            api::models::movies::NowPlayingMovie,
            api::models::shows::ShowCreateRequest,
            api::models::shows::ShowTimesEntry,
            api::models::shows::ShowResponse,
            api::models::shows::ShowWithMovieResponse,
            api::models::shows::MovieShowtimesResponse,
            api::models::shows::OccupiedSeatsResponse,
            api::models::bookings::BookingCreateRequest,
            api::models::bookings::BookingCreateResponse,
            api::models::bookings::BookingWithShowResponse,
            api::models::bookings::AdminBookingResponse,
            api::models::users::UserResponse,
            api::models::users::FavoriteToggleRequest,
            api::models::users::FavoriteToggleResponse,
            api::models::users::IsAdminResponse,
            api::models::admin::DashboardResponse,
        )
    ),
    tags(
        (name = "shows", description = "The movie catalog and its showtimes. Listing endpoints are \
            public; scheduling requires the admin role."),
        (name = "bookings", description = "Seat reservations. Seats are held for a configurable \
            window and released automatically if the booking is not paid."),
        (name = "users", description = "The caller's own bookings and favorite movies."),
        (name = "admin", description = "Back-office dashboard and listings. Requires the admin role."),
    )
)]
pub struct ApiDoc;
