use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::overlay::Projection;

pub const DEFAULT_USER_AGENT: &str = "nws-cli/0.1 (weather radar pipeline)";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_NWS_BASE_URL: &str = "https://api.weather.gov";
pub const DEFAULT_RADAR_URL_TEMPLATE: &str =
    "https://radar.weather.gov/ridge/standard/{station}_loop.gif";

/// Geocoding service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    /// Minimum spacing between two geocoding requests, in milliseconds.
    pub min_interval_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_GEOCODER_URL.to_string(), min_interval_ms: 1_000 }
    }
}

/// Radar download and overlay settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RadarConfig {
    /// URL with a single `{station}` placeholder.
    pub url_template: String,
    /// Directory for downloaded radar loops; the OS temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub projection: Projection,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_RADAR_URL_TEMPLATE.to_string(),
            temp_dir: None,
            canvas_width: 720,
            canvas_height: 360,
            projection: Projection::default(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// user_agent = "my-weather (me@example.com)"
/// nws_base_url = "https://api.weather.gov"
///
/// [geocoder]
/// min_interval_ms = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Sent with every request; both upstream services require one.
    pub user_agent: String,
    pub nws_base_url: String,
    /// Per-request timeout, in seconds.
    pub http_timeout_secs: u64,
    pub geocoder: GeocoderConfig,
    pub radar: RadarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nws_base_url: DEFAULT_NWS_BASE_URL.to_string(),
            http_timeout_secs: 10,
            geocoder: GeocoderConfig::default(),
            radar: RadarConfig::default(),
        }
    }
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn geocode_interval(&self) -> Duration {
        Duration::from_millis(self.geocoder.min_interval_ms)
    }

    pub fn radar_temp_dir(&self) -> PathBuf {
        self.radar.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "nws-radar", "nws-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(anyhow!("user_agent must not be empty"));
        }
        if self.radar.url_template.matches("{station}").count() != 1 {
            return Err(anyhow!(
                "radar.url_template must contain exactly one {{station}} placeholder"
            ));
        }
        if self.radar.canvas_width == 0 || self.radar.canvas_height == 0 {
            return Err(anyhow!("radar canvas dimensions must be non-zero"));
        }
        Ok(())
    }
}
