//! Text rendering for current conditions, the 7-day forecast and alerts.

use std::fmt::Write;

use crate::{
    error::{Stage, WeatherError},
    model::{Alert, ForecastPeriod},
};

pub const WRAP_WIDTH: usize = 70;
pub const NO_ALERTS: &str = "No alerts found";
const ALERT_SEPARATOR: &str = "-------------------------";

/// First period as `"{name}: {temp}°{unit}, {short forecast}\n"`.
pub fn current_conditions(periods: &[ForecastPeriod]) -> Result<String, WeatherError> {
    let current = periods.first().ok_or_else(|| WeatherError::MalformedResponse {
        stage: Stage::Forecast,
        reason: "forecast contains no periods".to_string(),
    })?;

    Ok(format!(
        "{}: {}°{}, {}\n",
        current.name, current.temperature, current.temperature_unit, current.short_forecast
    ))
}

/// Every period's name followed by its wrapped detailed forecast.
pub fn forecast(periods: &[ForecastPeriod]) -> String {
    let mut out = String::new();
    for period in periods {
        let _ = write!(out, "{}\n{}\n\n", period.name, wrap(&period.detailed_forecast, WRAP_WIDTH));
    }
    out
}

pub fn alerts(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return NO_ALERTS.to_string();
    }

    let mut out = String::new();
    for alert in alerts {
        let _ = writeln!(out, "Title: {}", alert.event);
        let _ = writeln!(out, "Description: {}", alert.description);
        let _ = writeln!(out, "Severity: {}", alert.severity);
        let _ = writeln!(out, "{ALERT_SEPARATOR}");
    }
    out
}

/// Greedy word wrap; words longer than `width` get a line of their own.
pub fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }

    lines.join("\n")
}
