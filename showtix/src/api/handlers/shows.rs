//! Public catalog, showtimes and seat maps, plus admin show scheduling.

use crate::{
    AppState,
    api::models::{
        movies::{MovieResponse, NowPlayingMovie},
        shows::{MovieShowtimesResponse, OccupiedSeatsResponse, ShowCreateRequest, ShowResponse},
    },
    auth::AdminUser,
    db::{
        handlers::{Movies, Repository, Shows, shows::ShowFilter},
        models::shows::ShowCreateDBRequest,
    },
    errors::{Error, Result},
    jobs::JobKind,
    types::{MovieId, ShowId},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

/// List movies currently playing at the metadata provider
#[utoipa::path(
    get,
    path = "/shows/now-playing",
    tag = "shows",
    summary = "List now-playing movies",
    description = "Fetch the metadata provider's now-playing listing, for admins picking movies to schedule",
    responses(
        (status = 200, description = "Now-playing movies", body = [NowPlayingMovie]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required"),
        (status = 502, description = "Metadata provider unavailable"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn now_playing(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<NowPlayingMovie>>> {
    let movies = state.metadata.now_playing().await?;
    Ok(Json(movies))
}

/// Register showtimes for a movie
#[utoipa::path(
    post,
    path = "/shows",
    tag = "shows",
    summary = "Register showtimes",
    description = "Create one show per date/time pair, caching the movie's metadata locally on first use",
    request_body = ShowCreateRequest,
    responses(
        (status = 201, description = "Shows created", body = [ShowResponse]),
        (status = 400, description = "Bad request - empty grid, malformed time, or non-positive price"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required"),
        (status = 502, description = "Metadata provider unavailable"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all, fields(movie_id = request.movie_id))]
pub async fn add_shows(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<ShowCreateRequest>,
) -> Result<(StatusCode, Json<Vec<ShowResponse>>)> {
    let start_times = parse_start_times(&request)?;

    if request.price <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Price must be greater than zero".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Schedule against the local cache; fetch from the provider only on first use
    {
        let mut repo = Movies::new(&mut pool_conn);
        if repo.get_by_id(request.movie_id).await?.is_none() {
            let details = state.metadata.movie_details(request.movie_id).await?;
            let credits = state.metadata.movie_credits(request.movie_id).await?;
            repo.create(&details.into_db_request(credits)).await?;
        }
    }

    let mut repo = Shows::new(&mut pool_conn);
    let mut created = Vec::with_capacity(start_times.len());
    for start_time in start_times {
        let show = repo
            .create(&ShowCreateDBRequest {
                movie_id: request.movie_id,
                start_time,
                price: request.price,
            })
            .await?;
        created.push(ShowResponse::from(show));
    }

    state
        .jobs
        .enqueue(&JobKind::NewShowBroadcast {
            movie_id: request.movie_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Flatten the date/time grid into concrete UTC start times.
fn parse_start_times(request: &ShowCreateRequest) -> Result<Vec<DateTime<Utc>>> {
    let mut start_times = Vec::new();
    for entry in &request.shows {
        for time in &entry.times {
            let parsed = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| Error::BadRequest {
                message: format!("Invalid showtime '{time}', expected HH:MM"),
            })?;
            start_times.push(entry.date.and_time(parsed).and_utc());
        }
    }

    if start_times.is_empty() {
        return Err(Error::BadRequest {
            message: "At least one showtime is required".to_string(),
        });
    }

    Ok(start_times)
}

/// List movies with upcoming shows
#[utoipa::path(
    get,
    path = "/shows",
    tag = "shows",
    summary = "List movies with upcoming shows",
    description = "The public catalog: every movie that has at least one show in the future",
    responses(
        (status = 200, description = "Movies with upcoming shows", body = [MovieResponse]),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_movies(State(state): State<AppState>) -> Result<Json<Vec<MovieResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Shows::new(&mut pool_conn);

    let movies = repo.list_upcoming_movies().await?;

    Ok(Json(movies.into_iter().map(MovieResponse::from).collect()))
}

/// Get a movie and its upcoming showtimes
#[utoipa::path(
    get,
    path = "/shows/{movie_id}",
    tag = "shows",
    summary = "Get a movie's showtimes",
    description = "A movie from the local catalog with its upcoming shows grouped by date",
    params(
        ("movie_id" = i64, Path, description = "Metadata provider movie id"),
    ),
    responses(
        (status = 200, description = "Movie with upcoming showtimes", body = MovieShowtimesResponse),
        (status = 404, description = "Movie not found"),
    )
)]
#[tracing::instrument(skip_all, fields(movie_id = movie_id))]
pub async fn movie_showtimes(
    State(state): State<AppState>,
    Path(movie_id): Path<MovieId>,
) -> Result<Json<MovieShowtimesResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let movie = Movies::new(&mut pool_conn)
        .get_by_id(movie_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Movie".to_string(),
            id: movie_id.to_string(),
        })?;

    let shows = Shows::new(&mut pool_conn)
        .list(&ShowFilter::upcoming_for_movie(movie_id))
        .await?;

    Ok(Json(MovieShowtimesResponse::new(movie.into(), shows)))
}

/// Get a show's occupied seats
#[utoipa::path(
    get,
    path = "/shows/{show_id}/seats",
    tag = "shows",
    summary = "Get a show's occupied seats",
    description = "Seat labels currently held or booked, for rendering the seat picker",
    params(
        ("show_id" = String, Path, description = "Show ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Occupied seat labels", body = OccupiedSeatsResponse),
        (status = 404, description = "Show not found"),
    )
)]
#[tracing::instrument(skip_all, fields(show_id = %show_id))]
pub async fn occupied_seats(
    State(state): State<AppState>,
    Path(show_id): Path<ShowId>,
) -> Result<Json<OccupiedSeatsResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let show = Shows::new(&mut pool_conn)
        .get_by_id(show_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Show".to_string(),
            id: show_id.to_string(),
        })?;

    let mut occupied_seats: Vec<String> = show.occupied_seats.0.into_keys().collect();
    occupied_seats.sort();

    Ok(Json(OccupiedSeatsResponse { occupied_seats }))
}
