//! Database models for movies cached from the metadata provider.

use crate::api::models::movies::{CastMember, Genre};
use crate::types::MovieId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Database request for caching a movie locally.
///
/// Field values come straight from the metadata provider's details and
/// credits endpoints; the id is the provider's id, not locally generated.
#[derive(Debug, Clone)]
pub struct MovieCreateDBRequest {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub original_language: Option<String>,
    pub tagline: Option<String>,
    pub genres: Vec<Genre>,
    pub casts: Vec<CastMember>,
    pub vote_average: f64,
    pub runtime: i32,
}

/// Database response for a movie
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MovieDBResponse {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub original_language: Option<String>,
    pub tagline: Option<String>,
    pub genres: Json<Vec<Genre>>,
    pub casts: Json<Vec<CastMember>>,
    pub vote_average: f64,
    pub runtime: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
