//! Database models for bookings.

use crate::types::{BookingId, ShowId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for creating a booking.
///
/// `amount` is derived server-side as unit price times seat count; it is
/// never taken from client input.
#[derive(Debug, Clone)]
pub struct BookingCreateDBRequest {
    pub user_id: UserId,
    pub show_id: ShowId,
    pub seats: Vec<String>,
    pub amount: Decimal,
}

/// Database request for updating a booking's payment state
#[derive(Debug, Clone, Default)]
pub struct BookingUpdateDBRequest {
    pub is_paid: Option<bool>,
    pub payment_link: Option<String>,
}

/// Database response for a booking
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingDBResponse {
    pub id: BookingId,
    pub user_id: UserId,
    pub show_id: ShowId,
    pub seats: Vec<String>,
    pub amount: Decimal,
    pub is_paid: bool,
    pub payment_link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
