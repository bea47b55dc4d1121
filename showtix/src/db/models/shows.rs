//! Database models for shows (screenings) and their seat occupancy.

use crate::types::{MovieId, ShowId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::HashMap;

/// Database request for scheduling a show
#[derive(Debug, Clone)]
pub struct ShowCreateDBRequest {
    pub movie_id: MovieId,
    pub start_time: DateTime<Utc>,
    pub price: Decimal,
}

/// Database request for updating a show
#[derive(Debug, Clone, Default)]
pub struct ShowUpdateDBRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub price: Option<Decimal>,
}

/// Database response for a show.
///
/// `occupied_seats` maps seat label to the holder's user id. A seat is free
/// iff its label is absent from the map; values exist only while a booking
/// (paid or pending) holds the seat.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShowDBResponse {
    pub id: ShowId,
    pub movie_id: MovieId,
    pub start_time: DateTime<Utc>,
    pub price: Decimal,
    pub occupied_seats: Json<HashMap<String, UserId>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShowDBResponse {
    /// True iff none of the requested seat labels are currently occupied.
    pub fn seats_available(&self, requested: &[String]) -> bool {
        requested.iter().all(|seat| !self.occupied_seats.contains_key(seat))
    }
}
