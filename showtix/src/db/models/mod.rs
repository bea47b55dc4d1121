//! Database record models matching table schemas.
//!
//! This module contains struct definitions that directly correspond to database
//! table rows. These models are used by repositories to return query results
//! and accept insertion/update data.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each model struct matches a database table schema
//! - **SQLx Integration**: Models derive `sqlx::FromRow` for query results
//! - **Separation**: Database models are distinct from API models to allow
//!   independent evolution of storage and API representations
//!
//! # Model Categories
//!
//! ## Catalog
//!
//! - [`movies`]: Movies cached from the external metadata provider
//! - [`shows`]: Screenings with per-seat occupancy maps
//!
//! ## Booking
//!
//! - [`bookings`]: Seat reservations and their payment state
//! - [`users`]: Users mirrored from the identity provider (plus favorites)
//!
//! ## Background Work
//!
//! - [`jobs`]: Durable job queue rows for deferred and async work
//!
//! # Conversion to API Models
//!
//! Database models typically implement `From` or `Into` conversions to API models:
//!
//! ```ignore
//! use showtix::db::models::shows::ShowDBResponse;
//! use showtix::api::models::shows::ShowResponse;
//!
//! let db_show: ShowDBResponse = /* ... */;
//! let api_response: ShowResponse = db_show.into();
//! ```

pub mod bookings;
pub mod jobs;
pub mod movies;
pub mod shows;
pub mod users;
