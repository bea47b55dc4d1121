//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories follow a consistent pattern and implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//! - Uses the connection's transaction for ACID guarantees
//!
//! # Available Repositories
//!
//! - [`Users`]: Mirrored identity-provider users and their favorites
//! - [`Movies`]: Locally cached movie metadata
//! - [`Shows`]: Screenings and seat occupancy (row-locked check-and-mark)
//! - [`Bookings`]: Seat reservations and payment state
//! - [`Jobs`]: Durable job queue rows (claim, complete, retry)
//!
//! # Common Pattern
//!
//! All repositories follow this usage pattern:
//!
//! ```ignore
//! use showtix::db::handlers::{Bookings, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     // Start a transaction
//!     let mut tx = pool.begin().await?;
//!
//!     // Create repository from transaction
//!     let mut repo = Bookings::new(&mut tx);
//!
//!     // Perform operations
//!     let booking = repo.get_by_id(booking_id).await?;
//!
//!     // Commit or rollback
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! # The Repository Trait
//!
//! The [`Repository`] trait defines common CRUD operations that all repositories
//! should implement:
//!
//! - `create()`: Insert a new record
//! - `get_by_id()` / `get_bulk()`: Fetch records by ID
//! - `list()`: List records with filtering
//! - `update()` / `delete()`: Modify or remove records

pub mod bookings;
pub mod jobs;
pub mod movies;
pub mod repository;
pub mod shows;
pub mod users;

pub use bookings::Bookings;
pub use jobs::Jobs;
pub use movies::Movies;
pub use repository::Repository;
pub use shows::Shows;
pub use users::Users;
