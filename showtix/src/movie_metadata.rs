//! Client for the movie metadata provider.
//!
//! Show registration and the now-playing listing pull movie data from a
//! TMDB-compatible HTTP API. Nothing on the user-facing booking path talks
//! to it.

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::api::models::movies::{MovieCredits, MovieDetails, NowPlayingMovie, NowPlayingResponse};
use crate::config::MovieMetadataConfig;
use crate::errors::Error;
use crate::types::MovieId;

pub struct MovieMetadataClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

/// Makes sure a url has a trailing slash.
///
/// `Url::join` resolves relative to the last path segment: joining
/// `/api/3` with `movie` yields `/api/movie`, while `/api/3/` yields
/// `/api/3/movie`. Call this before joining.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

impl MovieMetadataClient {
    pub fn new(config: &MovieMetadataConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("create metadata HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Movies currently in theaters, per the provider.
    #[instrument(skip(self), err)]
    pub async fn now_playing(&self) -> Result<Vec<NowPlayingMovie>, Error> {
        let response: NowPlayingResponse = self.get_json("movie/now_playing").await?;
        Ok(response.results)
    }

    /// Full details for one movie.
    #[instrument(skip(self), err)]
    pub async fn movie_details(&self, movie_id: MovieId) -> Result<MovieDetails, Error> {
        self.get_json(&format!("movie/{movie_id}")).await
    }

    /// Cast credits for one movie.
    #[instrument(skip(self), err)]
    pub async fn movie_credits(&self, movie_id: MovieId) -> Result<MovieCredits, Error> {
        self.get_json(&format!("movie/{movie_id}/credits")).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = ensure_slash(&self.base_url).join(path).map_err(|e| Error::Internal {
            operation: format!("construct metadata URL for {path}: {e}"),
        })?;

        debug!("Fetching metadata from URL: {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| Error::Upstream {
            service: "movie metadata provider".to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Metadata provider returned {} for {}: {}", status, url, body);
            return Err(Error::Upstream {
                service: "movie metadata provider".to_string(),
                message: format!("{status}: {body}"),
            });
        }

        let body_text = response.text().await.map_err(|e| Error::Upstream {
            service: "movie metadata provider".to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&body_text).map_err(|e| {
            tracing::error!("Failed to parse metadata response from {}: {}", url, e);
            tracing::debug!("Response body was: {}", body_text);
            Error::Upstream {
                service: "movie metadata provider".to_string(),
                message: format!("error decoding response body: {e}"),
            }
        })
    }
}
