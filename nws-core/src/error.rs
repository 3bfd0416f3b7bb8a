//! Error types for the weather pipeline.

use std::fmt;

use thiserror::Error;

/// Upstream call that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Geocode,
    Point,
    Forecast,
    Alerts,
    Radar,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Geocode => "geocode",
            Stage::Point => "point",
            Stage::Forecast => "forecast",
            Stage::Alerts => "alerts",
            Stage::Radar => "radar",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("location must not be empty")]
    EmptyInput,

    #[error("could not geocode location '{location}'")]
    Geocoding { location: String },

    #[error("coordinates out of range: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("{stage} request failed with status {status}")]
    UpstreamHttp { stage: Stage, status: u16 },

    #[error("{stage} request could not be sent: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },

    #[error("{stage} response was malformed: {reason}")]
    MalformedResponse { stage: Stage, reason: String },

    #[error("invalid radar station identifier '{0}'")]
    InvalidStation(String),

    #[error("failed to download radar image for {station}{}", status_suffix(.status))]
    RadarDownload { station: String, status: Option<u16> },

    #[error("failed to decode radar image for {station}: {reason}")]
    RadarDecode { station: String, reason: String },

    #[error("failed to render radar overlay: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl WeatherError {
    /// Pipeline stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Geocoding { .. } | Self::InvalidCoordinates { .. } => Some(Stage::Geocode),
            Self::UpstreamHttp { stage, .. }
            | Self::Transport { stage, .. }
            | Self::MalformedResponse { stage, .. } => Some(*stage),
            Self::InvalidStation(_)
            | Self::RadarDownload { .. }
            | Self::RadarDecode { .. } => Some(Stage::Radar),
            Self::EmptyInput | Self::Render(_) | Self::Io(_) => None,
        }
    }

    /// Caused by the location the user typed, not by a failing service.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::Geocoding { .. } | Self::InvalidCoordinates { .. }
        )
    }

    /// Plain-language message for the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyInput => "Please enter a location".to_string(),
            Self::Geocoding { .. } | Self::InvalidCoordinates { .. } => {
                "Could not geocode location".to_string()
            }
            Self::UpstreamHttp { stage: Stage::Point, .. } => {
                "Error retrieving zone data for this location".to_string()
            }
            Self::UpstreamHttp { stage: Stage::Alerts, status } => {
                format!("Error retrieving alerts data. Status code: {status}")
            }
            Self::UpstreamHttp { status, .. } => {
                format!("Error retrieving weather data. Status code: {status}")
            }
            Self::Transport { .. } => {
                "Could not reach the weather service. Check your connection.".to_string()
            }
            Self::MalformedResponse { .. } => {
                "The weather service returned data that could not be read".to_string()
            }
            Self::InvalidStation(_) => "No radar station found in the weather data".to_string(),
            Self::RadarDownload { .. } => "Failed to download radar image".to_string(),
            Self::RadarDecode { .. } => "Failed to decode radar image".to_string(),
            Self::Render(_) => "Failed to render radar overlay".to_string(),
            Self::Io(_) => "Local file error while handling radar image".to_string(),
        }
    }
}
