//! API request/response models for bookings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::movies::MovieResponse;
use crate::api::models::shows::ShowResponse;
use crate::api::models::users::UserResponse;
use crate::db::models::bookings::BookingDBResponse;
use crate::types::{BookingId, ShowId};

/// Request to reserve seats on a show.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingCreateRequest {
    #[schema(value_type = Uuid)]
    pub show_id: ShowId,
    /// Distinct seat labels, e.g. `["A1", "A2"]`
    pub seats: Vec<String>,
}

/// A fresh reservation with its checkout link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingCreateResponse {
    #[schema(value_type = Uuid)]
    pub booking_id: BookingId,
    /// Checkout URL the caller should redirect to
    pub payment_link: String,
}

/// A booking with its show and movie, for the owner's booking list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingWithShowResponse {
    #[schema(value_type = Uuid)]
    pub id: BookingId,
    pub seats: Vec<String>,
    #[schema(value_type = String, example = "20.00")]
    pub amount: Decimal,
    pub is_paid: bool,
    pub payment_link: String,
    pub created_at: DateTime<Utc>,
    pub show: ShowResponse,
    pub movie: MovieResponse,
}

impl BookingWithShowResponse {
    pub fn new(booking: BookingDBResponse, show: ShowResponse, movie: MovieResponse) -> Self {
        Self {
            id: booking.id,
            seats: booking.seats,
            amount: booking.amount,
            is_paid: booking.is_paid,
            payment_link: booking.payment_link,
            created_at: booking.created_at,
            show,
            movie,
        }
    }
}

/// A booking with its user, show and movie, for the admin overview.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminBookingResponse {
    #[schema(value_type = Uuid)]
    pub id: BookingId,
    pub seats: Vec<String>,
    #[schema(value_type = String, example = "20.00")]
    pub amount: Decimal,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub user: UserResponse,
    pub show: ShowResponse,
    pub movie: MovieResponse,
}

impl AdminBookingResponse {
    pub fn new(booking: BookingDBResponse, user: UserResponse, show: ShowResponse, movie: MovieResponse) -> Self {
        Self {
            id: booking.id,
            seats: booking.seats,
            amount: booking.amount,
            is_paid: booking.is_paid,
            created_at: booking.created_at,
            user,
            show,
            movie,
        }
    }
}
