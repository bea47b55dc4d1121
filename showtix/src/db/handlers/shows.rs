//! Database repository for shows and their seat occupancy.
//!
//! Seat occupancy lives in a JSONB map on the show row. Every check-and-mark
//! sequence must hold the show's row lock ([`Shows::get_for_update`]) so that
//! two concurrent bookings for the same seat serialize: the second sees the
//! first's marks and fails its re-check.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        movies::MovieDBResponse,
        shows::{ShowCreateDBRequest, ShowDBResponse, ShowUpdateDBRequest},
    },
};
use crate::types::{MovieId, ShowId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use sqlx::types::Json;
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing shows
#[derive(Debug, Clone, Default)]
pub struct ShowFilter {
    pub movie_id: Option<MovieId>,
    pub upcoming_only: bool,
}

impl ShowFilter {
    pub fn upcoming() -> Self {
        Self {
            movie_id: None,
            upcoming_only: true,
        }
    }

    pub fn upcoming_for_movie(movie_id: MovieId) -> Self {
        Self {
            movie_id: Some(movie_id),
            upcoming_only: true,
        }
    }
}

pub struct Shows<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Shows<'c> {
    type CreateRequest = ShowCreateDBRequest;
    type UpdateRequest = ShowUpdateDBRequest;
    type Response = ShowDBResponse;
    type Id = ShowId;
    type Filter = ShowFilter;

    #[instrument(skip(self, request), fields(movie_id = request.movie_id, start_time = %request.start_time), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let show = sqlx::query_as::<_, ShowDBResponse>(
            r#"
            INSERT INTO shows (movie_id, start_time, price)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.movie_id)
        .bind(request.start_time)
        .bind(request.price)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(show)
    }

    #[instrument(skip(self), fields(show_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let show = sqlx::query_as::<_, ShowDBResponse>("SELECT * FROM shows WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(show)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ShowId>) -> Result<HashMap<Self::Id, ShowDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let shows = sqlx::query_as::<_, ShowDBResponse>("SELECT * FROM shows WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(shows.into_iter().map(|show| (show.id, show)).collect())
    }

    #[instrument(skip(self, filter), fields(movie_id = filter.movie_id, upcoming_only = filter.upcoming_only), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let shows = sqlx::query_as::<_, ShowDBResponse>(
            r#"
            SELECT * FROM shows
            WHERE ($1::BIGINT IS NULL OR movie_id = $1)
              AND (NOT $2 OR start_time > NOW())
            ORDER BY start_time
            "#,
        )
        .bind(filter.movie_id)
        .bind(filter.upcoming_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(shows)
    }

    #[instrument(skip(self), fields(show_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shows WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(show_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let show = sqlx::query_as::<_, ShowDBResponse>(
            r#"
            UPDATE shows SET
                start_time = COALESCE($2, start_time),
                price = COALESCE($3, price),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.start_time)
        .bind(request.price)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(show)
    }
}

impl<'c> Shows<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Load a show under its row lock. Callers must be inside a transaction;
    /// the lock is held until that transaction ends.
    #[instrument(skip(self), fields(show_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: ShowId) -> Result<Option<ShowDBResponse>> {
        let show = sqlx::query_as::<_, ShowDBResponse>("SELECT * FROM shows WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(show)
    }

    /// Replace the show's occupancy map. Only call while holding the row lock
    /// taken by [`get_for_update`](Self::get_for_update).
    #[instrument(skip(self, occupied_seats), fields(show_id = %abbrev_uuid(&id), occupied = occupied_seats.len()), err)]
    pub async fn set_occupied_seats(&mut self, id: ShowId, occupied_seats: &HashMap<String, UserId>) -> Result<()> {
        let result = sqlx::query("UPDATE shows SET occupied_seats = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(Json(occupied_seats))
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    /// True iff the show exists and none of the requested seats are occupied.
    /// A missing show reads as unavailable, not as an error. No side effects;
    /// the booking workflow re-checks under the row lock before marking.
    #[instrument(skip(self, requested), fields(show_id = %abbrev_uuid(&id), requested = requested.len()), err)]
    pub async fn seats_available(&mut self, id: ShowId, requested: &[String]) -> Result<bool> {
        let Some(show) = self.get_by_id(id).await? else {
            return Ok(false);
        };

        Ok(show.seats_available(requested))
    }

    /// Movies that have at least one upcoming show (the public catalog listing)
    #[instrument(skip(self), err)]
    pub async fn list_upcoming_movies(&mut self) -> Result<Vec<MovieDBResponse>> {
        let movies = sqlx::query_as::<_, MovieDBResponse>(
            r#"
            SELECT m.* FROM movies m
            WHERE EXISTS (SELECT 1 FROM shows s WHERE s.movie_id = m.id AND s.start_time > NOW())
            ORDER BY m.title
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(movies)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::test_utils::{create_test_movie, create_test_show};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_show_starts_empty(pool: PgPool) {
        create_test_movie(&pool, 603).await;
        let show = create_test_show(&pool, 603, Duration::hours(24), Decimal::new(1000, 2)).await;

        assert!(show.occupied_seats.is_empty());
        assert_eq!(show.price, Decimal::new(1000, 2));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_seats_available_against_db(pool: PgPool) {
        create_test_movie(&pool, 603).await;
        let show = create_test_show(&pool, 603, Duration::hours(24), Decimal::new(1000, 2)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Shows::new(&mut conn);

        assert!(repo.seats_available(show.id, &["A1".to_string()]).await.unwrap());

        let occupied = HashMap::from([("A1".to_string(), "user_1".to_string())]);
        repo.set_occupied_seats(show.id, &occupied).await.unwrap();

        assert!(!repo.seats_available(show.id, &["A1".to_string()]).await.unwrap());
        assert!(repo.seats_available(show.id, &["B1".to_string()]).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_seats_available_missing_show_is_false(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Shows::new(&mut conn);

        let available = repo.seats_available(uuid::Uuid::new_v4(), &["A1".to_string()]).await.unwrap();
        assert!(!available);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_upcoming_filters_past_shows(pool: PgPool) {
        create_test_movie(&pool, 603).await;
        create_test_movie(&pool, 604).await;
        let upcoming_show = create_test_show(&pool, 603, Duration::hours(24), Decimal::new(1000, 2)).await;
        create_test_show(&pool, 604, Duration::hours(-2), Decimal::new(1000, 2)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Shows::new(&mut conn);

        let upcoming = repo.list(&ShowFilter::upcoming()).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, upcoming_show.id);

        let movies = repo.list_upcoming_movies().await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, 603);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_show_price(pool: PgPool) {
        create_test_movie(&pool, 603).await;
        let show = create_test_show(&pool, 603, Duration::hours(24), Decimal::new(1000, 2)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Shows::new(&mut conn);

        let updated = repo
            .update(
                show.id,
                &ShowUpdateDBRequest {
                    price: Some(Decimal::new(1250, 2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, Decimal::new(1250, 2));
        assert_eq!(updated.start_time, show.start_time);
    }
}
