use std::{fmt, time::Duration};

use chrono::{DateTime, FixedOffset};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Trim a user-supplied location, rejecting blank input.
pub fn normalize_location(location: &str) -> Result<&str, WeatherError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::EmptyInput);
    }
    Ok(trimmed)
}

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, WeatherError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !valid {
            return Err(WeatherError::InvalidCoordinates { latitude, longitude });
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// `lat,lon` path segment for the point lookup.
    ///
    /// The weather service redirects requests with more than four decimal
    /// places, so values are rounded and trailing zeros dropped.
    pub fn point_path(&self) -> String {
        format!("{},{}", round4(self.latitude), round4(self.longitude))
    }
}

fn round4(value: f64) -> f64 {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    // avoid "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// Result of the point lookup for a pair of coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointMetadata {
    pub forecast_url: String,
    pub radar_station: String,
    pub forecast_zone_url: String,
}

impl PointMetadata {
    /// Short zone identifier, the last `/`-delimited segment of the zone URL.
    pub fn zone_id(&self) -> Option<&str> {
        zone_short_id(&self.forecast_zone_url)
    }

    pub fn station_id(&self) -> Result<StationId, WeatherError> {
        StationId::parse(&self.radar_station)
    }
}

pub(crate) fn zone_short_id(zone_url: &str) -> Option<&str> {
    zone_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// One named forecast period ("Tonight", "Wednesday", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub number: u32,
    pub name: String,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub is_daytime: bool,
    pub temperature: i32,
    pub temperature_unit: String,
    pub short_forecast: String,
    pub detailed_forecast: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
    Extreme,
    #[default]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "Minor",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
            Severity::Extreme => "Extreme",
            Severity::Unknown => "Unknown",
        }
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "minor" => Severity::Minor,
            "moderate" => Severity::Moderate,
            "severe" => Severity::Severe,
            "extreme" => Severity::Extreme,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An active alert for a forecast zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub event: String,
    pub description: String,
    pub severity: Severity,
}

/// Radar station identifier that is safe to embed in a URL or file name.
///
/// Accepts 3–4 ASCII letters or digits; the value is upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationId(String);

impl StationId {
    pub fn parse(raw: &str) -> Result<Self, WeatherError> {
        let valid = (3..=4).contains(&raw.len()) && raw.bytes().all(|b| b.is_ascii_alphanumeric());
        if !valid {
            return Err(WeatherError::InvalidStation(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded radar frame in animation order.
#[derive(Debug, Clone)]
pub struct RadarFrame {
    pub image: RgbaImage,
    pub delay: Duration,
}

impl RadarFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_location_is_rejected() {
        assert!(matches!(normalize_location("   "), Err(WeatherError::EmptyInput)));
        assert!(matches!(normalize_location(""), Err(WeatherError::EmptyInput)));
        assert_eq!(normalize_location("  Chicago, IL ").unwrap(), "Chicago, IL");
    }

    #[test]
    fn coordinates_enforce_ranges() {
        assert!(Coordinates::new(41.88, -87.63).is_ok());
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(90.1, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn point_path_rounds_to_four_places() {
        let c = Coordinates::new(41.875_562_3, -87.624_421_4).unwrap();
        assert_eq!(c.point_path(), "41.8756,-87.6244");

        let c = Coordinates::new(39.0, -77.5).unwrap();
        assert_eq!(c.point_path(), "39,-77.5");
    }

    #[test]
    fn zone_id_is_last_path_segment() {
        let meta = PointMetadata {
            forecast_url: "https://api.weather.gov/gridpoints/LOT/76,73/forecast".into(),
            radar_station: "KLOT".into(),
            forecast_zone_url: "https://api.weather.gov/zones/forecast/ILZ014".into(),
        };
        assert_eq!(meta.zone_id(), Some("ILZ014"));
        assert_eq!(zone_short_id("https://api.weather.gov/zones/forecast/ILZ014/"), Some("ILZ014"));
        assert_eq!(zone_short_id(""), None);
    }

    #[test]
    fn station_id_allow_list() {
        assert_eq!(StationId::parse("LOT").unwrap().as_str(), "LOT");
        assert_eq!(StationId::parse("klot").unwrap().as_str(), "KLOT");

        for bad in ["", "LO", "KLOTX", "../x", "LO T", "L/T", "KL%2", "ÄBC"] {
            assert!(
                matches!(StationId::parse(bad), Err(WeatherError::InvalidStation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn severity_parses_known_values_and_defaults_to_unknown() {
        assert_eq!(Severity::from("Severe"), Severity::Severe);
        assert_eq!(Severity::from("minor"), Severity::Minor);
        assert_eq!(Severity::from("Whatever"), Severity::Unknown);
    }
}
