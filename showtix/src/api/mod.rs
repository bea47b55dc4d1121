//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! The API is divided into several functional areas:
//!
//! - **Shows** (`/api/v1/shows/*`): Movie catalog, showtimes and seat occupancy
//! - **Bookings** (`/api/v1/bookings`): Seat reservation and checkout
//! - **Users** (`/api/v1/users/me/*`): The acting user's bookings and favorites
//! - **Admin** (`/api/v1/admin/*`): Dashboard, show registration, booking overview
//! - **Webhooks** (`/webhooks/*`): Payment and identity provider callbacks
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI/Swagger annotations using `utoipa`.
//! API documentation is available at `/docs` when the server is running.

pub mod handlers;
pub mod models;
