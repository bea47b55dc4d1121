//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`admin`]: Admin role probe, dashboard metrics, and back-office listings
//! - [`bookings`]: Seat reservation and checkout session creation
//! - [`identity`]: Identity-provider webhook that mirrors users locally
//! - [`payments`]: Payment-provider webhook that settles bookings
//! - [`shows`]: Public catalog, showtimes, seat maps, and admin scheduling
//! - [`users`]: The caller's bookings and favorite movies
//!
//! # Authentication
//!
//! Authenticated handlers take the [`crate::api::models::users::CurrentUser`]
//! or [`crate::auth::AdminUser`] extractor, both resolved from the trusted
//! proxy header. The webhook handlers authenticate by signature instead.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

pub mod admin;
pub mod bookings;
pub mod identity;
pub mod payments;
pub mod shows;
pub mod users;
