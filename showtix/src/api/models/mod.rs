//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request
//! deserialization and response serialization. These models define the public
//! API contract and are distinct from the database models, so the API and
//! storage representations can evolve independently. All of them carry
//! `utoipa` annotations for the generated OpenAPI document.
//!
//! # Model Categories
//!
//! - [`movies`]: Movie catalog DTOs plus the metadata provider's wire types
//! - [`shows`]: Show registration requests and showtime listings
//! - [`bookings`]: Booking creation and composed booking views
//! - [`users`]: User profiles, favorites, and identity webhook payloads
//! - [`admin`]: Admin dashboard aggregates

pub mod admin;
pub mod bookings;
pub mod movies;
pub mod shows;
pub mod users;
