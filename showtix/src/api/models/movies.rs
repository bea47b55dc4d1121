//! API request/response models for the movie catalog, plus the wire types the
//! metadata provider returns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::movies::{MovieCreateDBRequest, MovieDBResponse};
use crate::types::MovieId;

/// A genre tag as delivered by the metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// A cast credit as delivered by the metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CastMember {
    pub name: String,
    pub profile_path: Option<String>,
}

/// A movie from the local catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovieResponse {
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
    pub created_at: DateTime<Utc>,
}

impl From<MovieDBResponse> for MovieResponse {
    fn from(db: MovieDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            overview: db.overview,
            poster_path: db.poster_path,
            backdrop_path: db.backdrop_path,
            release_date: db.release_date,
            original_language: db.original_language,
            tagline: db.tagline,
            genres: db.genres.0,
            casts: db.casts.0,
            vote_average: db.vote_average,
            runtime: db.runtime,
            created_at: db.created_at,
        }
    }
}

/// One entry of the metadata provider's now-playing listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NowPlayingMovie {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    /// Provider date string (`YYYY-MM-DD`), sometimes empty
    pub release_date: Option<String>,
    pub vote_average: f64,
}

impl Default for NowPlayingMovie {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            overview: String::new(),
            poster_path: None,
            backdrop_path: None,
            release_date: None,
            vote_average: 0.0,
        }
    }
}

/// The metadata provider's now-playing envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct NowPlayingResponse {
    #[serde(default)]
    pub results: Vec<NowPlayingMovie>,
}

/// Full movie details from the metadata provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MovieDetails {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    /// Provider date string (`YYYY-MM-DD`), sometimes empty
    pub release_date: Option<String>,
    pub original_language: Option<String>,
    pub tagline: Option<String>,
    pub genres: Vec<Genre>,
    pub vote_average: f64,
    pub runtime: Option<i32>,
}

impl Default for MovieDetails {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            overview: String::new(),
            poster_path: None,
            backdrop_path: None,
            release_date: None,
            original_language: None,
            tagline: None,
            genres: Vec::new(),
            vote_average: 0.0,
            runtime: None,
        }
    }
}

/// Cast credits from the metadata provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieCredits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
}

/// How many cast credits are cached with a movie.
pub const CAST_LIMIT: usize = 12;

impl MovieDetails {
    /// Assemble the local cache row from details + credits.
    pub fn into_db_request(self, credits: MovieCredits) -> MovieCreateDBRequest {
        let release_date = self
            .release_date
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        MovieCreateDBRequest {
            id: self.id,
            title: self.title,
            overview: self.overview,
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            release_date,
            original_language: self.original_language,
            tagline: self.tagline,
            genres: self.genres,
            casts: credits.cast.into_iter().take(CAST_LIMIT).collect(),
            vote_average: self.vote_average,
            runtime: self.runtime.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_db_request_parses_release_date() {
        let details: MovieDetails = serde_json::from_value(serde_json::json!({
            "id": 603,
            "title": "The Matrix",
            "release_date": "1999-03-30",
            "runtime": 136
        }))
        .unwrap();

        let request = details.into_db_request(MovieCredits::default());
        assert_eq!(request.release_date, NaiveDate::from_ymd_opt(1999, 3, 30));
        assert_eq!(request.runtime, 136);
    }

    #[test]
    fn test_into_db_request_tolerates_empty_release_date() {
        let details: MovieDetails = serde_json::from_value(serde_json::json!({
            "id": 603,
            "title": "The Matrix",
            "release_date": ""
        }))
        .unwrap();

        let request = details.into_db_request(MovieCredits::default());
        assert_eq!(request.release_date, None);
        assert_eq!(request.runtime, 0);
    }

    #[test]
    fn test_cast_limit_applied() {
        let cast = (0..20)
            .map(|i| CastMember {
                name: format!("Actor {i}"),
                profile_path: None,
            })
            .collect();

        let details = MovieDetails {
            id: 603,
            title: "The Matrix".to_string(),
            ..Default::default()
        };
        let request = details.into_db_request(MovieCredits { cast });

        assert_eq!(request.casts.len(), CAST_LIMIT);
    }
}
