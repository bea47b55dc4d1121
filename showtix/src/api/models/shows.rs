//! API request/response models for shows and showtimes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::api::models::movies::MovieResponse;
use crate::db::models::shows::ShowDBResponse;
use crate::types::{MovieId, ShowId};

/// Admin request to register showtimes for a movie.
///
/// One show row is created per date x time pair. Times are `HH:MM` (24 hour)
/// wall-clock values interpreted as UTC.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShowCreateRequest {
    /// Metadata provider movie id
    pub movie_id: MovieId,
    /// Date and time grid of showtimes to create
    pub shows: Vec<ShowTimesEntry>,
    /// Per-seat ticket price, shared by every created show
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
}

/// A date with its showtimes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShowTimesEntry {
    pub date: NaiveDate,
    /// `HH:MM` times on that date
    pub times: Vec<String>,
}

/// A single scheduled show.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShowResponse {
    #[schema(value_type = Uuid)]
    pub id: ShowId,
    pub movie_id: MovieId,
    pub start_time: DateTime<Utc>,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
}

impl From<ShowDBResponse> for ShowResponse {
    fn from(db: ShowDBResponse) -> Self {
        Self {
            id: db.id,
            movie_id: db.movie_id,
            start_time: db.start_time,
            price: db.price,
        }
    }
}

/// A show together with its movie, for admin listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShowWithMovieResponse {
    #[schema(value_type = Uuid)]
    pub id: ShowId,
    pub start_time: DateTime<Utc>,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    /// Seat labels currently held or booked
    pub occupied_seats: Vec<String>,
    pub movie: MovieResponse,
}

impl ShowWithMovieResponse {
    pub fn new(show: ShowDBResponse, movie: MovieResponse) -> Self {
        let mut occupied_seats: Vec<String> = show.occupied_seats.0.keys().cloned().collect();
        occupied_seats.sort();

        Self {
            id: show.id,
            start_time: show.start_time,
            price: show.price,
            occupied_seats,
            movie,
        }
    }
}

/// A movie plus its upcoming showtimes grouped by date.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovieShowtimesResponse {
    pub movie: MovieResponse,
    /// Upcoming shows keyed by their calendar date
    #[schema(value_type = Object)]
    pub showtimes: BTreeMap<NaiveDate, Vec<ShowResponse>>,
}

impl MovieShowtimesResponse {
    pub fn new(movie: MovieResponse, shows: Vec<ShowDBResponse>) -> Self {
        let mut showtimes: BTreeMap<NaiveDate, Vec<ShowResponse>> = BTreeMap::new();
        for show in shows {
            showtimes
                .entry(show.start_time.date_naive())
                .or_default()
                .push(show.into());
        }

        Self { movie, showtimes }
    }
}

/// The occupied seat labels of one show.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OccupiedSeatsResponse {
    pub occupied_seats: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::movies::MovieDBResponse;
    use chrono::TimeZone;
    use sqlx::types::Json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn movie() -> MovieResponse {
        MovieDBResponse {
            id: 603,
            title: "The Matrix".to_string(),
            overview: String::new(),
            poster_path: None,
            backdrop_path: None,
            release_date: None,
            original_language: None,
            tagline: None,
            genres: Json(vec![]),
            casts: Json(vec![]),
            vote_average: 0.0,
            runtime: 136,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
        .into()
    }

    fn show_at(start_time: DateTime<Utc>) -> ShowDBResponse {
        ShowDBResponse {
            id: Uuid::new_v4(),
            movie_id: 603,
            start_time,
            price: Decimal::new(1000, 2),
            occupied_seats: Json(HashMap::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_showtimes_grouped_by_date() {
        let first = show_at(Utc.with_ymd_and_hms(2025, 7, 4, 18, 30, 0).unwrap());
        let second = show_at(Utc.with_ymd_and_hms(2025, 7, 4, 21, 0, 0).unwrap());
        let next_day = show_at(Utc.with_ymd_and_hms(2025, 7, 5, 18, 30, 0).unwrap());

        let response = MovieShowtimesResponse::new(movie(), vec![first, second, next_day]);

        assert_eq!(response.showtimes.len(), 2);
        let fourth = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap();
        assert_eq!(response.showtimes[&fourth].len(), 2);
    }

    #[test]
    fn test_show_with_movie_sorts_seats() {
        let mut show = show_at(Utc.with_ymd_and_hms(2025, 7, 4, 18, 30, 0).unwrap());
        show.occupied_seats = Json(HashMap::from([
            ("B2".to_string(), "user_1".to_string()),
            ("A1".to_string(), "user_1".to_string()),
        ]));

        let response = ShowWithMovieResponse::new(show, movie());
        assert_eq!(response.occupied_seats, vec!["A1".to_string(), "B2".to_string()]);
    }
}
