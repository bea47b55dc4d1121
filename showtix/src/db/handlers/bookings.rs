//! Booking persistence.
//!
//! A booking pins a set of seats on a show to a user. Rows are created
//! unpaid with a payment link attached and flip to paid exactly once via
//! [`Bookings::mark_paid`]. Seat occupancy itself lives on the show row,
//! so booking mutations that touch occupancy happen inside a transaction
//! alongside [`super::Shows::set_occupied_seats`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;

use crate::db::errors::{DbError, Result};
use crate::db::handlers::repository::Repository;
use crate::db::models::bookings::{
    BookingCreateDBRequest, BookingDBResponse, BookingUpdateDBRequest,
};
use crate::types::{BookingId, UserId};

/// Filter for listing bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Restrict to bookings made by this user.
    pub user_id: Option<UserId>,
}

impl BookingFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

pub struct Bookings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Bookings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl<'c> Repository for Bookings<'c> {
    type CreateRequest = BookingCreateDBRequest;
    type UpdateRequest = BookingUpdateDBRequest;
    type Response = BookingDBResponse;
    type Id = BookingId;
    type Filter = BookingFilter;

    #[instrument(skip(self, request), fields(user_id = %request.user_id, show_id = %request.show_id, seats = request.seats.len()), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            INSERT INTO bookings (user_id, show_id, seats, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&request.user_id)
        .bind(request.show_id)
        .bind(&request.seats)
        .bind(request.amount)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(booking)
    }

    #[instrument(skip(self), fields(booking_id = %id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let booking =
            sqlx::query_as::<_, BookingDBResponse>("SELECT * FROM bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(booking)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let bookings =
            sqlx::query_as::<_, BookingDBResponse>("SELECT * FROM bookings WHERE id = ANY($1)")
                .bind(&ids)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(bookings
            .into_iter()
            .map(|booking| (booking.id, booking))
            .collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let bookings = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            SELECT * FROM bookings
            WHERE ($1::TEXT IS NULL OR user_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(&filter.user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(bookings)
    }

    #[instrument(skip(self), fields(booking_id = %id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(booking_id = %id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET is_paid = COALESCE($2, is_paid),
                payment_link = COALESCE($3, payment_link),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.is_paid)
        .bind(&request.payment_link)
        .fetch_optional(&mut *self.db)
        .await?;

        booking.ok_or(DbError::NotFound)
    }
}

impl<'c> Bookings<'c> {
    /// Fetch a booking and lock its row for the rest of the transaction.
    ///
    /// Callers must be running inside a transaction. The release job and the
    /// payment webhook serialize on this lock, so a seat rollback cannot race
    /// a settlement.
    #[instrument(skip(self), fields(booking_id = %id), err)]
    pub async fn get_for_update(&mut self, id: BookingId) -> Result<Option<BookingDBResponse>> {
        let booking =
            sqlx::query_as::<_, BookingDBResponse>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(booking)
    }

    /// Mark a booking paid and drop its checkout link.
    ///
    /// Returns `None` when the booking no longer exists.
    #[instrument(skip(self), fields(booking_id = %id), err)]
    pub async fn mark_paid(&mut self, id: BookingId) -> Result<Option<BookingDBResponse>> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings
            SET is_paid = TRUE,
                payment_link = '',
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(booking)
    }

    /// Paid bookings whose show starts after now but no later than `until`.
    ///
    /// Feeds the reminder sweep.
    #[instrument(skip(self), fields(until = %until), err)]
    pub async fn list_upcoming_paid(
        &mut self,
        until: DateTime<Utc>,
    ) -> Result<Vec<BookingDBResponse>> {
        let bookings = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            SELECT b.* FROM bookings b
            INNER JOIN shows s ON s.id = b.show_id
            WHERE b.is_paid AND s.start_time > NOW() AND s.start_time <= $1
            ORDER BY s.start_time
            "#,
        )
        .bind(until)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(bookings)
    }

    /// Count of paid bookings and their summed revenue.
    #[instrument(skip(self), err)]
    pub async fn dashboard_totals(&mut self) -> Result<(i64, Decimal)> {
        let totals = sqlx::query_as::<_, (i64, Decimal)>(
            r#"
            SELECT COUNT(*) FILTER (WHERE is_paid),
                   COALESCE(SUM(amount) FILTER (WHERE is_paid), 0)
            FROM bookings
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        Ok(totals)
    }
}
