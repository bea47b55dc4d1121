//! API response models for the admin dashboard.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::shows::ShowWithMovieResponse;

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    /// Count of paid bookings
    pub total_bookings: i64,
    /// Sum of paid booking amounts
    #[schema(value_type = String, example = "240.00")]
    pub total_revenue: Decimal,
    /// Upcoming shows with their movies
    pub active_shows: Vec<ShowWithMovieResponse>,
    pub total_users: i64,
}
