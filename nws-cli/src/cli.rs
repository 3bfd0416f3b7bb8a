use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{CustomType, InquireError, Select, Text};
use nws_core::{
    Action, ActionWorker, Config, Orchestrator, OverlayView, Projection, TempFileRegistry,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::display::{self, RadarOutput};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "nws", version, about = "Forecasts, alerts and radar from the National Weather Service")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Edit the configuration file interactively.
    Configure,

    /// Current conditions for a location.
    Current {
        /// Address or location name, e.g. "Chicago, IL".
        location: String,
    },

    /// 7-day forecast for a location.
    Forecast {
        location: String,
    },

    /// Active alerts for a location's forecast zone.
    Alerts {
        location: String,
    },

    /// Download the nearest radar loop and draw it on a basemap.
    Radar {
        location: String,

        /// Where to write the overlay.
        #[arg(short, long, default_value = "radar_overlay.gif")]
        output: PathBuf,

        /// Write a static PNG composite instead of an animated GIF.
        #[arg(long)]
        still: bool,

        /// Close the view right after writing instead of waiting for Enter.
        #[arg(long)]
        no_wait: bool,
    },

    /// Prompt for a location and pick actions until you quit.
    Interactive,
}

impl Cli {
    pub async fn run(self, registry: TempFileRegistry) -> anyhow::Result<ExitCode> {
        let default_output = RadarOutput::default();
        let succeeded = match self.command {
            Command::Configure => {
                configure().await?;
                true
            }
            Command::Current { location } => {
                run_once(&build(registry)?, Action::Current, &location, &default_output, false).await?
            }
            Command::Forecast { location } => {
                run_once(&build(registry)?, Action::Forecast, &location, &default_output, false).await?
            }
            Command::Alerts { location } => {
                run_once(&build(registry)?, Action::Alerts, &location, &default_output, false).await?
            }
            Command::Radar { location, output, still, no_wait } => {
                let output = RadarOutput { path: output, still };
                run_once(&build(registry)?, Action::Radar, &location, &output, !no_wait).await?
            }
            Command::Interactive => {
                interactive(build(registry)?).await?;
                true
            }
        };

        Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
    }
}

fn build(registry: TempFileRegistry) -> anyhow::Result<Orchestrator> {
    let config = Config::load()?;
    Orchestrator::new(&config, registry).context("Failed to set up weather clients")
}

/// Run a single action and show its result; `Ok(false)` once the failure has been reported.
async fn run_once(
    orchestrator: &Orchestrator,
    action: Action,
    location: &str,
    output: &RadarOutput,
    wait: bool,
) -> anyhow::Result<bool> {
    let shown = display::present(orchestrator.run(action, location).await, output);
    let succeeded = shown.succeeded();

    if let Some(view) = shown.into_view() {
        if wait {
            wait_for_enter("Press Enter to close the radar view").await?;
        }
        display::close(view);
    }
    Ok(succeeded)
}

async fn wait_for_enter(prompt: &str) -> anyhow::Result<()> {
    eprintln!("{prompt}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(())
}

/// Run a blocking prompt off the async runtime.
async fn prompt<T, F>(f: F) -> anyhow::Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InquireError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await? {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

const QUIT: &str = "Quit";

async fn interactive(orchestrator: Orchestrator) -> anyhow::Result<()> {
    let (worker, mut responses) = ActionWorker::spawn(Arc::new(orchestrator));
    let output = RadarOutput::default();
    let mut open_view: Option<OverlayView> = None;

    let Some(location) = prompt(|| Text::new("Enter your location:").prompt()).await? else {
        return Ok(());
    };

    loop {
        let mut options: Vec<&'static str> = Action::all().iter().map(Action::label).collect();
        options.push(QUIT);

        let Some(choice) = prompt(move || Select::new("Action:", options).prompt()).await? else {
            break;
        };
        let Some(action) = Action::all().iter().copied().find(|a| a.label() == choice) else {
            break;
        };

        // the previous radar view closes when another action is chosen
        if let Some(view) = open_view.take() {
            display::close(view);
        }

        if let Err(e) = worker.submit(action, location.clone()).await {
            tracing::error!("action worker stopped: {e}");
            eprintln!("Error: {action} could not be started");
            break;
        }
        let Some(response) = responses.recv().await else {
            break;
        };

        open_view = display::present(response.result, &output).into_view();
    }

    if let Some(view) = open_view.take() {
        display::close(view);
    }
    worker.shutdown().await;
    Ok(())
}

async fn configure() -> anyhow::Result<()> {
    let current = Config::load()?;
    let path = Config::config_file_path()?;
    println!("Editing {}", path.display());

    let defaults = current.clone();
    let answers = prompt(move || {
        let user_agent = Text::new("User-Agent (include a contact address):")
            .with_default(&defaults.user_agent)
            .prompt()?;

        let http_timeout_secs = CustomType::<u64>::new("HTTP timeout in seconds:")
            .with_default(defaults.http_timeout_secs)
            .prompt()?;

        let min_interval_ms = CustomType::<u64>::new("Minimum interval between geocoding requests (ms):")
            .with_default(defaults.geocoder.min_interval_ms)
            .prompt()?;

        let projections = vec![Projection::Equirectangular, Projection::WebMercator];
        let start = projections.iter().position(|p| *p == defaults.radar.projection).unwrap_or(0);
        let projection = Select::new("Basemap projection:", projections)
            .with_starting_cursor(start)
            .prompt()?;

        Ok((user_agent, http_timeout_secs, min_interval_ms, projection))
    })
    .await?;

    let Some((user_agent, http_timeout_secs, min_interval_ms, projection)) = answers else {
        println!("Configuration unchanged.");
        return Ok(());
    };

    let mut config = current;
    config.user_agent = user_agent;
    config.http_timeout_secs = http_timeout_secs;
    config.geocoder.min_interval_ms = min_interval_ms;
    config.radar.projection = projection;

    config.save()?;
    println!("Saved {}", path.display());
    Ok(())
}
