//! Geocoding client for turning place names into coordinates
//!
//! Backed by the Open-Meteo geocoding API, which needs no API key for the
//! public endpoint. The provider distinction that matters to callers is
//! "no match" (`Ok(None)`) versus "provider unreachable or broken" (`Err`);
//! the pipeline turns the former into an invalid-location outcome and the
//! latter into an unexpected failure.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::GeocodingConfig;
use crate::models::Coordinate;

/// Resolves free-form place names to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Look up a place name, returning `Ok(None)` when the provider has no match
    async fn geocode(&self, place: &str) -> Result<Option<Coordinate>>;
}

/// Open-Meteo geocoding API client
pub struct OpenMeteoGeocoder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenMeteoGeocoder {
    /// Create a new geocoding client
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.into());

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("izakaya-search/0.1.0")
            .build()
            .with_context(|| "Failed to create geocoding HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn search_url(&self, place: &str) -> String {
        let mut url = format!(
            "{}/search?name={}&count=1&language=en&format=json",
            self.base_url,
            urlencoding::encode(place)
        );
        if let Some(api_key) = &self.api_key {
            url.push_str("&apikey=");
            url.push_str(&urlencoding::encode(api_key));
        }
        url
    }
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinate>> {
        let url = self.search_url(place);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| "Geocoding request failed")?;

        if !response.status().is_success() {
            debug!(
                status = %response.status(),
                place,
                "geocoding provider returned non-success status"
            );
            return Ok(None);
        }

        let body: openmeteo::GeocodingResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse geocoding response")?;

        let Some(result) = body.results.unwrap_or_default().into_iter().next() else {
            debug!(place, "geocoding provider found no match");
            return Ok(None);
        };

        let coordinate = Coordinate::new(result.latitude, result.longitude)
            .map_err(|cause| anyhow!("geocoding provider returned {cause}"))?;
        debug!(
            place,
            matched = %result.name,
            country = result.country.as_deref().unwrap_or("unknown"),
            coordinates = %coordinate.format_coordinates(),
            "place name resolved"
        );
        Ok(Some(coordinate))
    }
}

/// Open-Meteo geocoding API response structures
mod openmeteo {
    use serde::Deserialize;

    /// Geocoding response from Open-Meteo
    #[derive(Debug, Deserialize)]
    pub struct GeocodingResponse {
        pub results: Option<Vec<GeocodingResult>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodingResult {
        pub name: String,
        pub latitude: f64,
        pub longitude: f64,
        pub country: Option<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_geocoder(api_key: Option<&str>) -> OpenMeteoGeocoder {
        OpenMeteoGeocoder::new(&GeocodingConfig {
            api_key: api_key.map(str::to_string),
            ..GeocodingConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_search_url_encodes_place_name() {
        let geocoder = test_geocoder(None);
        let url = geocoder.search_url("Osaka Station");
        assert_eq!(
            url,
            "https://geocoding-api.open-meteo.com/v1/search?name=Osaka%20Station&count=1&language=en&format=json"
        );
    }

    #[test]
    fn test_search_url_appends_api_key() {
        let geocoder = test_geocoder(Some("commercial-key"));
        let url = geocoder.search_url("Umeda");
        assert!(url.ends_with("&apikey=commercial-key"));
    }

    #[test]
    fn test_geocoding_response_with_matches() {
        let json = r#"{
            "results": [
                {
                    "id": 1853909,
                    "name": "Osaka",
                    "latitude": 34.69374,
                    "longitude": 135.50218,
                    "country": "Japan",
                    "admin1": "Osaka"
                }
            ],
            "generationtime_ms": 0.7
        }"#;
        let response: openmeteo::GeocodingResponse = serde_json::from_str(json).unwrap();
        let results = response.results.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Osaka");
        assert_eq!(results[0].latitude, 34.69374);
    }

    #[test]
    fn test_geocoding_response_without_matches() {
        // Open-Meteo omits the results key entirely when nothing matched.
        let response: openmeteo::GeocodingResponse =
            serde_json::from_str(r#"{"generationtime_ms": 0.3}"#).unwrap();
        assert!(response.results.is_none());
    }
}
