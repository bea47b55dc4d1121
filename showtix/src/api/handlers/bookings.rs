//! Seat reservation and checkout session creation.
//!
//! Booking a seat is a two-phase affair: a cheap availability pre-check
//! outside any lock, then a re-check under the show's row lock before the
//! seats are marked. Two concurrent requests for the same seat both pass the
//! pre-check at worst; only one survives the locked re-check.

use crate::{
    AppState,
    api::models::{
        bookings::{BookingCreateRequest, BookingCreateResponse},
        users::CurrentUser,
    },
    config::Config,
    db::{
        errors::DbError,
        handlers::{Bookings, Movies, Repository, Shows},
        models::bookings::{BookingCreateDBRequest, BookingUpdateDBRequest},
    },
    errors::{Error, Result},
    jobs::{self, JobKind},
    types::ShowId,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Book seats on a show
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    summary = "Book seats on a show",
    description = "Reserve seats, hold them for the configured release window, and return a checkout link. \
                   Unpaid bookings release their seats automatically when the window lapses.",
    request_body = BookingCreateRequest,
    responses(
        (status = 201, description = "Booking created with a checkout link", body = BookingCreateResponse),
        (status = 400, description = "Bad request - no seats, duplicate seats, or blank labels"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Show not found"),
        (status = 409, description = "One or more seats are already taken"),
        (status = 502, description = "Payment gateway unavailable"),
    ),
    security(
        ("X-Showtix-User" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, show_id = %request.show_id, seats = request.seats.len()))]
pub async fn create_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(request): Json<BookingCreateRequest>,
) -> Result<(StatusCode, Json<BookingCreateResponse>)> {
    validate_seats(&request.seats)?;

    // Cheap pre-check before taking the row lock
    {
        let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Shows::new(&mut pool_conn);
        if !repo.seats_available(request.show_id, &request.seats).await? {
            let seats = taken_seats(&mut repo, request.show_id, &request.seats).await?;
            return Err(Error::SeatsUnavailable { seats });
        }
    }

    let mut tx = state.db.begin().await.map_err(DbError::from)?;

    let show = Shows::new(&mut tx)
        .get_for_update(request.show_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Show".to_string(),
            id: request.show_id.to_string(),
        })?;

    // Re-check under the lock: a concurrent booking may have marked seats
    // since the pre-check
    if !show.seats_available(&request.seats) {
        let seats = request
            .seats
            .iter()
            .filter(|seat| show.occupied_seats.contains_key(*seat))
            .cloned()
            .collect();
        return Err(Error::SeatsUnavailable { seats });
    }

    let movie = Movies::new(&mut tx)
        .get_by_id(show.movie_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Movie".to_string(),
            id: show.movie_id.to_string(),
        })?;

    let amount = show.price * Decimal::from(request.seats.len());
    let booking = Bookings::new(&mut tx)
        .create(&BookingCreateDBRequest {
            user_id: user.id.clone(),
            show_id: show.id,
            seats: request.seats.clone(),
            amount,
        })
        .await?;

    let mut occupied = show.occupied_seats.0;
    for seat in &booking.seats {
        occupied.insert(seat.clone(), user.id.clone());
    }
    Shows::new(&mut tx).set_occupied_seats(show.id, &occupied).await?;

    // The release job commits atomically with the booking: every hold that
    // exists has an expiry scheduled
    jobs::enqueue_on(
        &mut tx,
        &JobKind::ReleaseBooking { booking_id: booking.id },
        Utc::now() + state.config.booking.release_window,
    )
    .await?;

    tx.commit().await.map_err(DbError::from)?;

    // From here the seats are held. If checkout session creation fails, the
    // hold simply expires through the release job.
    let origin = redirect_origin(&headers, &state.config);
    let success_url = format!("{origin}/bookings?payment=success&session_id={{CHECKOUT_SESSION_ID}}");
    let cancel_url = format!("{origin}/bookings?payment=cancelled&session_id={{CHECKOUT_SESSION_ID}}");

    let payment_link = state
        .payment
        .create_checkout_session(&booking, &movie.title, &cancel_url, &success_url)
        .await?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Bookings::new(&mut pool_conn)
        .update(
            booking.id,
            &BookingUpdateDBRequest {
                payment_link: Some(payment_link.clone()),
                ..Default::default()
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingCreateResponse {
            booking_id: booking.id,
            payment_link,
        }),
    ))
}

fn validate_seats(seats: &[String]) -> Result<()> {
    if seats.is_empty() {
        return Err(Error::BadRequest {
            message: "At least one seat is required".to_string(),
        });
    }

    if seats.iter().any(|seat| seat.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Seat labels cannot be blank".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(seats.len());
    if let Some(duplicate) = seats.iter().find(|seat| !seen.insert(seat.as_str())) {
        return Err(Error::BadRequest {
            message: format!("Seat {duplicate} is listed more than once"),
        });
    }

    Ok(())
}

/// The subset of requested seats already occupied, for the conflict payload.
/// A show that vanished reports every requested seat.
async fn taken_seats(repo: &mut Shows<'_>, show_id: ShowId, requested: &[String]) -> Result<Vec<String>> {
    let Some(show) = repo.get_by_id(show_id).await? else {
        return Ok(requested.to_vec());
    };

    Ok(requested
        .iter()
        .filter(|seat| show.occupied_seats.contains_key(*seat))
        .cloned()
        .collect())
}

/// Derive the browser origin for checkout redirect URLs. Prefers the Origin
/// header, falls back to the Referer's origin, then to the configured
/// frontend URL.
fn redirect_origin(headers: &HeaderMap, config: &Config) -> String {
    headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| {
            // A referer carries a path; reduce either header to its origin
            if let Ok(url) = url::Url::parse(s) {
                url.origin().ascii_serialization().into()
            } else {
                Some(s.to_string())
            }
        })
        .unwrap_or_else(|| config.frontend_url.trim_end_matches('/').to_string())
}
