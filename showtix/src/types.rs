//! Common type definitions shared across the crate.
//!
//! This module defines type aliases for entity IDs:
//!
//! - [`UserId`]: Identity-provider user id (opaque string, e.g. `user_2x7...`)
//! - [`MovieId`]: Upstream catalogue movie id
//! - [`ShowId`]: Screening identifier
//! - [`BookingId`]: Booking identifier
//! - [`JobId`]: Queued job identifier
//!
//! Users are mirrored from an external identity provider, so [`UserId`] keeps
//! the provider's string form instead of a locally minted UUID. Movies keep
//! the upstream catalogue's numeric ids so metadata refreshes stay trivial.

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = String;
pub type MovieId = i64;
pub type ShowId = Uuid;
pub type BookingId = Uuid;
pub type JobId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
