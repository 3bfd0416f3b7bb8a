//! Forward geocoding: free-text location to coordinates.
//! Uses Nominatim (OpenStreetMap), which asks for at most one request per second.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;
use tracing::instrument;

use crate::{
    config::Config,
    error::{Stage, WeatherError},
    http,
    model::{Coordinates, normalize_location},
    rate_limit::RateLimiter,
};

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Resolve a location to a single best-match coordinate pair.
    async fn resolve(&self, location: &str) -> Result<Coordinates, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: Client,
    base_url: String,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Why a lookup failed. Logged, then collapsed into `WeatherError::Geocoding`.
#[derive(Debug)]
enum LookupFailure {
    Transport(reqwest::Error),
    Status(u16),
    Parse(String),
    NotFound,
    BadCoordinates(String),
}

impl NominatimGeocoder {
    pub fn new(config: &Config) -> Result<Self, WeatherError> {
        let http = http::build_client(&config.user_agent, config.http_timeout())
            .map_err(|source| WeatherError::Transport { stage: Stage::Geocode, source })?;

        Ok(Self::with_client(
            http,
            &config.geocoder.base_url,
            RateLimiter::new(config.geocode_interval()),
        ))
    }

    pub fn with_client(http: Client, base_url: &str, limiter: RateLimiter) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), limiter }
    }

    async fn lookup(&self, location: &str) -> Result<Coordinates, LookupFailure> {
        self.limiter.acquire().await;

        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(LookupFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupFailure::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(LookupFailure::Transport)?;
        let places: Vec<NominatimPlace> = serde_json::from_str(&body)
            .map_err(|e| LookupFailure::Parse(format!("{e}: {}", http::truncate_body(&body))))?;

        let place = places.into_iter().next().ok_or(LookupFailure::NotFound)?;

        let latitude: f64 =
            place.lat.parse().map_err(|_| LookupFailure::BadCoordinates(place.lat.clone()))?;
        let longitude: f64 =
            place.lon.parse().map_err(|_| LookupFailure::BadCoordinates(place.lon.clone()))?;

        let coords = Coordinates::new(latitude, longitude)
            .map_err(|e| LookupFailure::BadCoordinates(e.to_string()))?;

        tracing::info!(
            %coords,
            name = place.display_name.as_deref().unwrap_or("<unnamed>"),
            "geocoded location"
        );
        Ok(coords)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self), level = "info")]
    async fn resolve(&self, location: &str) -> Result<Coordinates, WeatherError> {
        let location = normalize_location(location)?;

        self.lookup(location).await.map_err(|failure| {
            match &failure {
                LookupFailure::Transport(e) => tracing::warn!("geocoding request failed: {e}"),
                LookupFailure::Status(s) => tracing::warn!("geocoder returned status {s}"),
                LookupFailure::Parse(e) => tracing::warn!("geocoder response unreadable: {e}"),
                LookupFailure::NotFound => tracing::warn!("geocoder found no match"),
                LookupFailure::BadCoordinates(v) => {
                    tracing::warn!("geocoder returned unusable coordinates: {v}")
                }
            }
            WeatherError::Geocoding { location: location.to_string() }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder(server: &MockServer) -> NominatimGeocoder {
        let http = http::build_client("nws-test", Duration::from_secs(5)).unwrap();
        NominatimGeocoder::with_client(http, &server.uri(), RateLimiter::new(Duration::ZERO))
    }

    #[tokio::test]
    async fn resolves_first_match() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Chicago, IL"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "41.8755616", "lon": "-87.6244212", "display_name": "Chicago, Cook County, Illinois"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let coords = geocoder(&server).resolve("Chicago, IL").await.unwrap();
        assert!((coords.latitude() - 41.88).abs() < 0.01);
        assert!((coords.longitude() + 87.63).abs() < 0.01);
    }

    #[tokio::test]
    async fn consecutive_lookups_are_spaced_by_the_limiter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "41.8755616", "lon": "-87.6244212"}
            ])))
            .expect(2)
            .mount(&server)
            .await;

        let http = http::build_client("nws-test", Duration::from_secs(5)).unwrap();
        let geocoder = NominatimGeocoder::with_client(
            http,
            &server.uri(),
            RateLimiter::new(Duration::from_millis(200)),
        );

        let start = std::time::Instant::now();
        geocoder.resolve("Chicago, IL").await.unwrap();
        geocoder.resolve("Chicago, IL").await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn empty_result_is_geocoding_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("Atlantis").await.unwrap_err();
        assert!(matches!(err, WeatherError::Geocoding { ref location } if location == "Atlantis"));
    }

    #[tokio::test]
    async fn upstream_failure_is_geocoding_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("Chicago").await.unwrap_err();
        assert!(matches!(err, WeatherError::Geocoding { .. }));
    }

    #[tokio::test]
    async fn out_of_range_coordinates_are_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "123.0", "lon": "0.0"}
            ])))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("Somewhere").await.unwrap_err();
        assert!(matches!(err, WeatherError::Geocoding { .. }));
    }

    #[tokio::test]
    async fn blank_location_never_hits_the_network() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("  ").await.unwrap_err();
        assert!(matches!(err, WeatherError::EmptyInput));
    }
}
