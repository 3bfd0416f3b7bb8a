//! Core library for the `nws` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - Geocoding (with a fair-use rate limit) and the api.weather.gov client
//! - Radar loop download, decoding and projection onto a basemap
//! - Text formatting and the per-action orchestrator
//!
//! It is used by `nws-cli`, but can also be reused by other front ends.

pub mod config;
pub mod error;
pub mod format;
pub mod geocode;
mod http;
pub mod model;
pub mod nws;
pub mod orchestrator;
pub mod overlay;
pub mod radar;
pub mod rate_limit;
pub mod worker;

pub use config::Config;
pub use error::{Stage, WeatherError};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use model::{Alert, Coordinates, ForecastPeriod, PointMetadata, RadarFrame, Severity, StationId};
pub use nws::{Forecast, NwsClient};
pub use orchestrator::{Action, ActionError, ActionOutcome, ActionState, ActionTrace, Orchestrator};
pub use overlay::{GeoRasterOverlay, OverlayCanvas, OverlayView, Projection};
pub use radar::{RadarFetcher, SessionToken, TempFileRegistry};
pub use worker::{ActionRequest, ActionResponse, ActionWorker};
