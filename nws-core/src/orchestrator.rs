//! Runs the four user actions end to end and maps failures for display.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    config::Config,
    error::{Stage, WeatherError},
    format,
    geocode::{Geocoder, NominatimGeocoder},
    model::normalize_location,
    nws::NwsClient,
    overlay::{GeoRasterOverlay, OverlayView},
    radar::{RadarDownload, RadarFetcher, SessionToken, TempFileRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Radar,
    Current,
    Forecast,
    Alerts,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Radar => "radar",
            Action::Current => "current",
            Action::Forecast => "forecast",
            Action::Alerts => "alerts",
        }
    }

    /// Button-style label for menus.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Radar => "Radar",
            Action::Current => "Current Weather",
            Action::Forecast => "7-Day Forecast",
            Action::Alerts => "Alerts",
        }
    }

    pub const fn all() -> &'static [Action] {
        &[Action::Radar, Action::Forecast, Action::Current, Action::Alerts]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Action {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "radar" => Ok(Action::Radar),
            "current" => Ok(Action::Current),
            "forecast" => Ok(Action::Forecast),
            "alerts" => Ok(Action::Alerts),
            _ => Err(format!(
                "Unknown action '{value}'. Supported actions: radar, current, forecast, alerts."
            )),
        }
    }
}

/// Where a single action invocation currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    Geocoding,
    FetchingData,
    Rendering,
    Formatting,
    Done,
    Failed(String),
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Done | ActionState::Failed(_))
    }
}

/// Sequence of states one invocation went through, starting at `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTrace {
    action: Action,
    states: Vec<ActionState>,
}

impl ActionTrace {
    fn new(action: Action) -> Self {
        Self { action, states: vec![ActionState::Idle] }
    }

    fn advance(&mut self, next: ActionState) {
        if self.current().is_terminal() {
            tracing::warn!(action = %self.action, ?next, "ignoring transition out of terminal state");
            return;
        }
        tracing::debug!(action = %self.action, from = ?self.current(), to = ?next, "action state");
        self.states.push(next);
    }

    pub fn current(&self) -> &ActionState {
        // never empty: constructed with Idle
        self.states.last().unwrap_or(&ActionState::Idle)
    }

    pub fn states(&self) -> &[ActionState] {
        &self.states
    }
}

/// What a successful action hands to the display layer.
#[derive(Debug)]
pub enum ActionOutcome {
    Text(String),
    Radar(OverlayView),
}

impl ActionOutcome {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ActionOutcome::Text(text) => Some(text.as_str()),
            ActionOutcome::Radar(_) => None,
        }
    }

    pub fn into_view(self) -> Option<OverlayView> {
        match self {
            ActionOutcome::Radar(view) => Some(view),
            ActionOutcome::Text(_) => None,
        }
    }
}

/// A failed action: the single error the user gets to see.
#[derive(Error, Debug)]
#[error("{action} failed: {source}")]
pub struct ActionError {
    pub action: Action,
    #[source]
    pub source: WeatherError,
}

impl ActionError {
    pub fn stage(&self) -> Option<Stage> {
        self.source.stage()
    }

    pub fn user_message(&self) -> String {
        self.source.user_message()
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    geocoder: Arc<dyn Geocoder>,
    nws: NwsClient,
    radar: RadarFetcher,
    overlay: GeoRasterOverlay,
}

impl Orchestrator {
    pub fn new(config: &Config, registry: TempFileRegistry) -> Result<Self, WeatherError> {
        Ok(Self::with_parts(
            Arc::new(NominatimGeocoder::new(config)?),
            NwsClient::new(config)?,
            RadarFetcher::new(config, registry)?,
            GeoRasterOverlay::from_config(&config.radar)?,
        ))
    }

    pub fn with_parts(
        geocoder: Arc<dyn Geocoder>,
        nws: NwsClient,
        radar: RadarFetcher,
        overlay: GeoRasterOverlay,
    ) -> Self {
        Self { geocoder, nws, radar, overlay }
    }

    /// Registry of radar files still on disk.
    pub fn registry(&self) -> &TempFileRegistry {
        self.radar.registry()
    }

    pub async fn run(&self, action: Action, location: &str) -> Result<ActionOutcome, ActionError> {
        self.run_traced(action, location).await.0
    }

    /// Run an action from scratch and return the states it passed through.
    pub async fn run_traced(
        &self,
        action: Action,
        location: &str,
    ) -> (Result<ActionOutcome, ActionError>, ActionTrace) {
        let mut trace = ActionTrace::new(action);

        let result = self
            .execute(action, location, &mut trace)
            .await
            .map_err(|source| ActionError { action, source });

        match &result {
            Ok(_) => {
                trace.advance(ActionState::Done);
                tracing::info!(%action, "action completed");
            }
            Err(e) => {
                trace.advance(ActionState::Failed(e.user_message()));
                if e.source.is_input_error() {
                    tracing::warn!(%action, "action rejected: {}", e.source);
                } else {
                    tracing::error!(%action, stage = ?e.stage(), "action failed: {}", e.source);
                }
            }
        }

        (result, trace)
    }

    async fn execute(
        &self,
        action: Action,
        location: &str,
        trace: &mut ActionTrace,
    ) -> Result<ActionOutcome, WeatherError> {
        trace.advance(ActionState::Geocoding);
        let location = normalize_location(location)?;
        let coords = self.geocoder.resolve(location).await?;

        trace.advance(ActionState::FetchingData);
        match action {
            Action::Current => {
                let forecast = self.nws.get_forecast(coords).await?;
                trace.advance(ActionState::Formatting);
                Ok(ActionOutcome::Text(format::current_conditions(&forecast.periods)?))
            }
            Action::Forecast => {
                let forecast = self.nws.get_forecast(coords).await?;
                trace.advance(ActionState::Formatting);
                Ok(ActionOutcome::Text(format::forecast(&forecast.periods)))
            }
            Action::Alerts => {
                let alerts = self.nws.get_alerts(coords).await?;
                trace.advance(ActionState::Formatting);
                Ok(ActionOutcome::Text(format::alerts(&alerts)))
            }
            Action::Radar => {
                let station = self.nws.get_radar_station(coords).await?;
                let RadarDownload { frames, file, .. } =
                    self.radar.fetch(&station, &SessionToken::generate()).await?;

                trace.advance(ActionState::Rendering);
                let canvas = self.overlay.render(&frames)?;
                Ok(ActionOutcome::Radar(OverlayView::new(canvas, file)))
            }
        }
    }
}
