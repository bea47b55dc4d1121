//! The caller's own bookings and favorite movies.

use crate::{
    AppState,
    api::models::{
        bookings::BookingWithShowResponse,
        movies::MovieResponse,
        users::{CurrentUser, FavoriteToggleRequest, FavoriteToggleResponse},
    },
    db::handlers::{Bookings, Movies, Repository, Shows, Users, bookings::BookingFilter},
    errors::{Error, Result},
    types::{MovieId, ShowId},
};
use axum::{extract::State, response::Json};
use std::collections::HashSet;
use tracing::warn;

/// List the caller's bookings
#[utoipa::path(
    get,
    path = "/users/me/bookings",
    tag = "users",
    summary = "List my bookings",
    description = "Every booking the caller has made, newest first, each with its show and movie",
    responses(
        (status = 200, description = "The caller's bookings", body = [BookingWithShowResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn my_bookings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<BookingWithShowResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let bookings = Bookings::new(&mut pool_conn)
        .list(&BookingFilter::for_user(user.id.clone()))
        .await?;

    let show_ids: HashSet<ShowId> = bookings.iter().map(|b| b.show_id).collect();
    let shows = Shows::new(&mut pool_conn).get_bulk(show_ids.into_iter().collect()).await?;

    let movie_ids: HashSet<MovieId> = shows.values().map(|s| s.movie_id).collect();
    let movies = Movies::new(&mut pool_conn).get_bulk(movie_ids.into_iter().collect()).await?;

    let mut responses = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let Some(show) = shows.get(&booking.show_id) else {
            warn!("Booking {} references missing show {}", booking.id, booking.show_id);
            continue;
        };
        let Some(movie) = movies.get(&show.movie_id) else {
            warn!("Show {} references missing movie {}", show.id, show.movie_id);
            continue;
        };

        responses.push(BookingWithShowResponse::new(
            booking,
            show.clone().into(),
            movie.clone().into(),
        ));
    }

    Ok(Json(responses))
}

/// Toggle a favorite movie
#[utoipa::path(
    post,
    path = "/users/me/favorites",
    tag = "users",
    summary = "Toggle a favorite movie",
    description = "Add the movie to the caller's favorites, or remove it if already present",
    request_body = FavoriteToggleRequest,
    responses(
        (status = 200, description = "Resulting favorite state", body = FavoriteToggleResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Movie not found"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, movie_id = request.movie_id))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<FavoriteToggleRequest>,
) -> Result<Json<FavoriteToggleResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // 404 on unknown movies rather than surfacing the FK violation
    Movies::new(&mut pool_conn)
        .get_by_id(request.movie_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Movie".to_string(),
            id: request.movie_id.to_string(),
        })?;

    let favorited = Users::new(&mut pool_conn)
        .toggle_favorite(&user.id, request.movie_id)
        .await?;

    Ok(Json(FavoriteToggleResponse { favorited }))
}

/// List favorite movies
#[utoipa::path(
    get,
    path = "/users/me/favorites",
    tag = "users",
    summary = "List my favorite movies",
    description = "The caller's favorite movies, most recently added first",
    responses(
        (status = 200, description = "Favorite movies", body = [MovieResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<MovieResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let movies = Users::new(&mut pool_conn).list_favorites(&user.id).await?;

    Ok(Json(movies.into_iter().map(MovieResponse::from).collect()))
}
