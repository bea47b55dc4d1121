//! Admin role probe, dashboard metrics, and back-office listings.

use crate::{
    AppState,
    api::models::{
        admin::DashboardResponse,
        bookings::AdminBookingResponse,
        shows::ShowWithMovieResponse,
        users::{CurrentUser, IsAdminResponse},
    },
    auth::AdminUser,
    db::handlers::{
        Bookings, Movies, Repository, Shows, Users, bookings::BookingFilter, shows::ShowFilter,
    },
    errors::{Error, Result},
    types::{MovieId, ShowId, UserId},
};
use axum::{extract::State, response::Json};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::warn;

/// Check whether the caller is an admin
#[utoipa::path(
    get,
    path = "/admin/is-admin",
    tag = "admin",
    summary = "Check admin role",
    description = "Whether the caller holds the admin role. Answers false instead of rejecting, \
                   so frontends can branch on it.",
    responses(
        (status = 200, description = "The caller's admin state", body = IsAdminResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn is_admin(user: CurrentUser) -> Json<IsAdminResponse> {
    Json(IsAdminResponse {
        is_admin: user.is_admin,
    })
}

/// Admin dashboard metrics
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "admin",
    summary = "Admin dashboard",
    description = "Paid booking count, summed revenue, mirrored user count, and the upcoming shows",
    responses(
        (status = 200, description = "Dashboard metrics", body = DashboardResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn dashboard(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<DashboardResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let (total_bookings, total_revenue) = Bookings::new(&mut pool_conn).dashboard_totals().await?;
    let total_users = Users::new(&mut pool_conn).count().await?;
    let active_shows = upcoming_shows_with_movies(&mut pool_conn).await?;

    Ok(Json(DashboardResponse {
        total_bookings,
        total_revenue,
        active_shows,
        total_users,
    }))
}

/// List upcoming shows for the back office
#[utoipa::path(
    get,
    path = "/admin/shows",
    tag = "admin",
    summary = "List upcoming shows",
    description = "Every upcoming show with its movie and current seat occupancy",
    responses(
        (status = 200, description = "Upcoming shows", body = [ShowWithMovieResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_shows(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ShowWithMovieResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let shows = upcoming_shows_with_movies(&mut pool_conn).await?;

    Ok(Json(shows))
}

/// List all bookings for the back office
#[utoipa::path(
    get,
    path = "/admin/bookings",
    tag = "admin",
    summary = "List all bookings",
    description = "Every booking, newest first, each with its user, show and movie",
    responses(
        (status = 200, description = "All bookings", body = [AdminBookingResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_bookings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<AdminBookingResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let bookings = Bookings::new(&mut pool_conn).list(&BookingFilter::all()).await?;

    let show_ids: HashSet<ShowId> = bookings.iter().map(|b| b.show_id).collect();
    let shows = Shows::new(&mut pool_conn).get_bulk(show_ids.into_iter().collect()).await?;

    let movie_ids: HashSet<MovieId> = shows.values().map(|s| s.movie_id).collect();
    let movies = Movies::new(&mut pool_conn).get_bulk(movie_ids.into_iter().collect()).await?;

    let user_ids: HashSet<UserId> = bookings.iter().map(|b| b.user_id.clone()).collect();
    let users = Users::new(&mut pool_conn).get_bulk(user_ids.into_iter().collect()).await?;

    let mut responses = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let (Some(show), Some(user)) = (shows.get(&booking.show_id), users.get(&booking.user_id)) else {
            warn!("Booking {} references a missing show or user", booking.id);
            continue;
        };
        let Some(movie) = movies.get(&show.movie_id) else {
            warn!("Show {} references missing movie {}", show.id, show.movie_id);
            continue;
        };

        responses.push(AdminBookingResponse::new(
            booking,
            user.clone().into(),
            show.clone().into(),
            movie.clone().into(),
        ));
    }

    Ok(Json(responses))
}

async fn upcoming_shows_with_movies(conn: &mut PgConnection) -> Result<Vec<ShowWithMovieResponse>> {
    let shows = Shows::new(conn).list(&ShowFilter::upcoming()).await?;

    let movie_ids: HashSet<MovieId> = shows.iter().map(|s| s.movie_id).collect();
    let movies = Movies::new(conn).get_bulk(movie_ids.into_iter().collect()).await?;

    let mut responses = Vec::with_capacity(shows.len());
    for show in shows {
        let Some(movie) = movies.get(&show.movie_id) else {
            warn!("Show {} references missing movie {}", show.id, show.movie_id);
            continue;
        };

        responses.push(ShowWithMovieResponse::new(show, movie.clone().into()));
    }

    Ok(responses)
}
