//! Database repository for locally cached movie metadata.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::movies::{MovieCreateDBRequest, MovieDBResponse},
};
use crate::types::MovieId;
use sqlx::PgConnection;
use sqlx::types::Json;
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing movies
#[derive(Debug, Clone)]
pub struct MovieFilter {
    pub skip: i64,
    pub limit: i64,
}

impl MovieFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Movies<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Movies<'c> {
    type CreateRequest = MovieCreateDBRequest;
    type UpdateRequest = MovieCreateDBRequest;
    type Response = MovieDBResponse;
    type Id = MovieId;
    type Filter = MovieFilter;

    /// Cache a movie locally. The row carries the provider's id, so creation
    /// is an upsert: re-registering a movie refreshes its cached metadata.
    #[instrument(skip(self, request), fields(movie_id = request.id, title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let movie = sqlx::query_as::<_, MovieDBResponse>(
            r#"
            INSERT INTO movies (id, title, overview, poster_path, backdrop_path, release_date,
                                original_language, tagline, genres, casts, vote_average, runtime)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                overview = EXCLUDED.overview,
                poster_path = EXCLUDED.poster_path,
                backdrop_path = EXCLUDED.backdrop_path,
                release_date = EXCLUDED.release_date,
                original_language = EXCLUDED.original_language,
                tagline = EXCLUDED.tagline,
                genres = EXCLUDED.genres,
                casts = EXCLUDED.casts,
                vote_average = EXCLUDED.vote_average,
                runtime = EXCLUDED.runtime,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(&request.title)
        .bind(&request.overview)
        .bind(&request.poster_path)
        .bind(&request.backdrop_path)
        .bind(request.release_date)
        .bind(&request.original_language)
        .bind(&request.tagline)
        .bind(Json(&request.genres))
        .bind(Json(&request.casts))
        .bind(request.vote_average)
        .bind(request.runtime)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(movie)
    }

    #[instrument(skip(self), fields(movie_id = id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let movie = sqlx::query_as::<_, MovieDBResponse>("SELECT * FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(movie)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<MovieId>) -> Result<HashMap<Self::Id, MovieDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let movies = sqlx::query_as::<_, MovieDBResponse>("SELECT * FROM movies WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(movies.into_iter().map(|movie| (movie.id, movie)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let movies =
            sqlx::query_as::<_, MovieDBResponse>("SELECT * FROM movies ORDER BY title LIMIT $1 OFFSET $2")
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(movies)
    }

    #[instrument(skip(self), fields(movie_id = id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(movie_id = id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let movie = sqlx::query_as::<_, MovieDBResponse>(
            r#"
            UPDATE movies SET
                title = $2,
                overview = $3,
                poster_path = $4,
                backdrop_path = $5,
                release_date = $6,
                original_language = $7,
                tagline = $8,
                genres = $9,
                casts = $10,
                vote_average = $11,
                runtime = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.overview)
        .bind(&request.poster_path)
        .bind(&request.backdrop_path)
        .bind(request.release_date)
        .bind(&request.original_language)
        .bind(&request.tagline)
        .bind(Json(&request.genres))
        .bind(Json(&request.casts))
        .bind(request.vote_average)
        .bind(request.runtime)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(movie)
    }
}

impl<'c> Movies<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}
