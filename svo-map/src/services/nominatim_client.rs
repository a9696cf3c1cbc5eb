//! Nominatim (OpenStreetMap) geocoding client
//!
//! One HTTP search per call, no pacing and no retries: those belong to
//! `RateLimitedResolver`, which wraps any `GeocodeProvider`.
//!
//! API Documentation: https://nominatim.org/release-docs/latest/api/Search/

use crate::models::Coordinates;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use svo_common::config::GeocodingConfig;
use thiserror::Error;

/// Geocoding provider errors
#[derive(Debug, Clone, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl GeocodeError {
    /// Worth retrying after a pause
    pub fn is_transient(&self) -> bool {
        match self {
            GeocodeError::Network(_) | GeocodeError::Timeout | GeocodeError::RateLimited => true,
            GeocodeError::Api(status, _) => *status >= 500,
            GeocodeError::Parse(_) => false,
        }
    }
}

/// External free-text geocoder
///
/// `Ok(None)` means the provider answered and knows no such place.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// One hit of a `/search?format=jsonv2` response (coordinates are strings)
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// Nominatim HTTP client
pub struct NominatimClient {
    http_client: Client,
    base_url: String,
}

impl NominatimClient {
    /// # Errors
    /// `GeocodeError::Network` if the HTTP client cannot be built.
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(5)))
            .build()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let url = format!("{}/search", self.base_url);

        tracing::debug!(query = %query, "Querying Nominatim");

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout
                } else {
                    GeocodeError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(GeocodeError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Api(status.as_u16(), error_text));
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(e.to_string()))?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let coordinates = parse_hit(&hit)?;

        tracing::debug!(
            query = %query,
            display_name = %hit.display_name,
            lat = coordinates.latitude,
            lon = coordinates.longitude,
            "Nominatim match"
        );

        Ok(Some(coordinates))
    }
}

fn parse_hit(hit: &SearchHit) -> Result<Coordinates, GeocodeError> {
    let latitude: f64 = hit
        .lat
        .trim()
        .parse()
        .map_err(|_| GeocodeError::Parse(format!("bad latitude '{}'", hit.lat)))?;
    let longitude: f64 = hit
        .lon
        .trim()
        .parse()
        .map_err(|_| GeocodeError::Parse(format!("bad longitude '{}'", hit.lon)))?;

    let coordinates = Coordinates::new(latitude, longitude);
    if !coordinates.is_valid() {
        return Err(GeocodeError::Parse(format!(
            "coordinates out of range ({}, {})",
            latitude, longitude
        )));
    }
    Ok(coordinates)
}
