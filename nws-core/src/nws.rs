//! api.weather.gov client: point lookup, forecast periods, active alerts.

use chrono::{DateTime, FixedOffset};
use reqwest::{Client, header};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    config::Config,
    error::{Stage, WeatherError},
    http,
    model::{Alert, Coordinates, ForecastPeriod, PointMetadata, Severity, StationId},
};

const GEO_JSON: &str = "application/geo+json";

/// Point metadata together with its ordered forecast periods.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub point: PointMetadata,
    pub periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Clone)]
pub struct NwsClient {
    http: Client,
    base_url: String,
}

impl NwsClient {
    pub fn new(config: &Config) -> Result<Self, WeatherError> {
        let http = http::build_client(&config.user_agent, config.http_timeout())
            .map_err(|source| WeatherError::Transport { stage: Stage::Point, source })?;
        Ok(Self::with_client(http, &config.nws_base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string() }
    }

    async fn get_json<T>(&self, stage: Stage, url: &str) -> Result<T, WeatherError>
    where
        T: serde::de::DeserializeOwned,
    {
        tracing::debug!(%stage, %url, "GET");
        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, GEO_JSON)
            .send()
            .await
            .map_err(|source| WeatherError::Transport { stage, source })?;

        let response = http::check_status(stage, response)?;
        http::read_json(stage, response).await
    }

    /// Resolve the point record for a pair of coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn point(&self, coords: Coordinates) -> Result<PointMetadata, WeatherError> {
        let url = format!("{}/points/{}", self.base_url, coords.point_path());
        let parsed: PointResponse = self.get_json(Stage::Point, &url).await?;
        parsed.properties.into_metadata()
    }

    /// Forecast periods at a forecast URL, in the order the service returns them.
    #[instrument(skip(self), level = "info")]
    pub async fn forecast_at(&self, forecast_url: &str) -> Result<Vec<ForecastPeriod>, WeatherError> {
        let parsed: ForecastResponse = self.get_json(Stage::Forecast, forecast_url).await?;
        Ok(parsed.properties.periods.into_iter().map(ForecastPeriod::from).collect())
    }

    /// Active alerts for a forecast zone short id such as `ILZ014`.
    #[instrument(skip(self), level = "info")]
    pub async fn alerts_for_zone(&self, zone_id: &str) -> Result<Vec<Alert>, WeatherError> {
        let valid = !zone_id.is_empty() && zone_id.bytes().all(|b| b.is_ascii_alphanumeric());
        if !valid {
            return Err(WeatherError::MalformedResponse {
                stage: Stage::Point,
                reason: format!("unusable forecast zone id '{zone_id}'"),
            });
        }

        let url = format!("{}/alerts/active?zone={zone_id}", self.base_url);
        let parsed: AlertsResponse = self.get_json(Stage::Alerts, &url).await?;
        Ok(parsed.features.into_iter().map(|f| Alert::from(f.properties)).collect())
    }

    /// Point lookup followed by the forecast fetch.
    pub async fn get_forecast(&self, coords: Coordinates) -> Result<Forecast, WeatherError> {
        let point = self.point(coords).await?;
        let periods = self.forecast_at(&point.forecast_url).await?;
        Ok(Forecast { point, periods })
    }

    /// Point lookup followed by the alerts fetch for the point's zone.
    pub async fn get_alerts(&self, coords: Coordinates) -> Result<Vec<Alert>, WeatherError> {
        let point = self.point(coords).await?;
        let zone_id = point.zone_id().ok_or_else(|| WeatherError::MalformedResponse {
            stage: Stage::Point,
            reason: format!("no zone id in '{}'", point.forecast_zone_url),
        })?;
        self.alerts_for_zone(zone_id).await
    }

    /// Radar station serving the point, validated for use in URLs and file names.
    pub async fn get_radar_station(&self, coords: Coordinates) -> Result<StationId, WeatherError> {
        self.point(coords).await?.station_id()
    }
}

#[derive(Debug, Deserialize)]
struct PointResponse {
    properties: PointProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointProperties {
    forecast: Option<String>,
    radar_station: Option<String>,
    forecast_zone: Option<String>,
}

impl PointProperties {
    fn into_metadata(self) -> Result<PointMetadata, WeatherError> {
        let missing = |field: &str| WeatherError::MalformedResponse {
            stage: Stage::Point,
            reason: format!("point record has no {field}"),
        };

        Ok(PointMetadata {
            forecast_url: self.forecast.ok_or_else(|| missing("forecast"))?,
            radar_station: self.radar_station.ok_or_else(|| missing("radarStation"))?,
            forecast_zone_url: self.forecast_zone.ok_or_else(|| missing("forecastZone"))?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<PeriodDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodDto {
    #[serde(default)]
    number: u32,
    name: String,
    #[serde(default)]
    start_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    is_daytime: bool,
    temperature: i32,
    #[serde(default = "default_unit")]
    temperature_unit: String,
    short_forecast: String,
    #[serde(default)]
    detailed_forecast: String,
}

fn default_unit() -> String {
    "F".to_string()
}

impl From<PeriodDto> for ForecastPeriod {
    fn from(p: PeriodDto) -> Self {
        Self {
            number: p.number,
            name: p.name,
            start_time: p.start_time,
            is_daytime: p.is_daytime,
            temperature: p.temperature,
            temperature_unit: p.temperature_unit,
            short_forecast: p.short_forecast,
            detailed_forecast: p.detailed_forecast,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AlertsResponse {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
struct AlertProperties {
    event: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

impl From<AlertProperties> for Alert {
    fn from(p: AlertProperties) -> Self {
        Self {
            event: p.event,
            description: p.description.unwrap_or_default(),
            severity: p.severity.as_deref().map(Severity::from).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn point_body(base: &str, station: &str) -> serde_json::Value {
        serde_json::json!({
            "properties": {
                "forecast": format!("{base}/gridpoints/LOT/76,73/forecast"),
                "forecastZone": format!("{base}/zones/forecast/ILZ014"),
                "radarStation": station,
            }
        })
    }

    pub(crate) fn forecast_body() -> serde_json::Value {
        serde_json::json!({
            "properties": {
                "periods": [
                    {
                        "number": 1,
                        "name": "Tonight",
                        "startTime": "2026-10-19T18:00:00-05:00",
                        "isDaytime": false,
                        "temperature": 48,
                        "temperatureUnit": "F",
                        "shortForecast": "Mostly Cloudy",
                        "detailedForecast": "Mostly cloudy, with a low around 48. West wind around 10 mph."
                    },
                    {
                        "number": 2,
                        "name": "Monday",
                        "startTime": "2026-10-20T06:00:00-05:00",
                        "isDaytime": true,
                        "temperature": 61,
                        "temperatureUnit": "F",
                        "shortForecast": "Sunny",
                        "detailedForecast": "Sunny, with a high near 61."
                    }
                ]
            }
        })
    }

    fn client(server: &MockServer) -> NwsClient {
        let http = http::build_client("nws-test", Duration::from_secs(5)).unwrap();
        NwsClient::with_client(http, &server.uri())
    }

    fn coords() -> Coordinates {
        Coordinates::new(41.8756, -87.6244).unwrap()
    }

    #[tokio::test]
    async fn point_lookup_yields_metadata() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/41.8756,-87.6244"))
            .respond_with(ResponseTemplate::new(200).set_body_json(point_body(&server.uri(), "KLOT")))
            .expect(1)
            .mount(&server)
            .await;

        let meta = client(&server).point(coords()).await.unwrap();
        assert_eq!(meta.radar_station, "KLOT");
        assert_eq!(meta.zone_id(), Some("ILZ014"));
        assert!(meta.forecast_url.ends_with("/gridpoints/LOT/76,73/forecast"));
    }

    #[tokio::test]
    async fn forecast_keeps_service_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/41.8756,-87.6244"))
            .respond_with(ResponseTemplate::new(200).set_body_json(point_body(&server.uri(), "KLOT")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/LOT/76,73/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&server)
            .await;

        let forecast = client(&server).get_forecast(coords()).await.unwrap();
        let names: Vec<_> = forecast.periods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Tonight", "Monday"]);
        assert_eq!(forecast.periods[0].temperature, 48);
        assert!(forecast.periods[0].start_time.is_some());
        assert_eq!(forecast.point.radar_station, "KLOT");
    }

    #[tokio::test]
    async fn point_404_is_typed_and_stops_the_chain() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/41.8756,-87.6244"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/LOT/76,73/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server).get_forecast(coords()).await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamHttp { stage: Stage::Point, status: 404 }));
    }

    #[tokio::test]
    async fn forecast_failure_reports_forecast_stage() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/41.8756,-87.6244"))
            .respond_with(ResponseTemplate::new(200).set_body_json(point_body(&server.uri(), "KLOT")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/LOT/76,73/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).get_forecast(coords()).await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamHttp { stage: Stage::Forecast, status: 500 }));
    }

    #[tokio::test]
    async fn alerts_use_zone_short_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/41.8756,-87.6244"))
            .respond_with(ResponseTemplate::new(200).set_body_json(point_body(&server.uri(), "KLOT")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/alerts/active"))
            .and(query_param("zone", "ILZ014"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "features": [
                    {"properties": {"event": "Wind Advisory", "description": "Gusts to 50 mph.", "severity": "Moderate"}},
                    {"properties": {"event": "Special Weather Statement", "description": null, "severity": "Bogus"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let alerts = client(&server).get_alerts(coords()).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].event, "Wind Advisory");
        assert_eq!(alerts[0].severity, Severity::Moderate);
        assert_eq!(alerts[1].description, "");
        assert_eq!(alerts[1].severity, Severity::Unknown);
    }

    #[tokio::test]
    async fn zero_alerts_is_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/alerts/active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"features": []})))
            .mount(&server)
            .await;

        let alerts = client(&server).alerts_for_zone("ILZ014").await.unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn malformed_forecast_is_an_error_not_a_partial_record() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"periods": [{"name": "Tonight"}]}
            })))
            .mount(&server)
            .await;

        let url = format!("{}/forecast", server.uri());
        let err = client(&server).forecast_at(&url).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { stage: Stage::Forecast, .. }));
    }

    #[tokio::test]
    async fn radar_station_is_validated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/41.8756,-87.6244"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(point_body(&server.uri(), "../etc")),
            )
            .mount(&server)
            .await;

        let err = client(&server).get_radar_station(coords()).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidStation(_)));
    }
}
