use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nws_core::{ActionError, ActionOutcome, OverlayView};

/// How a radar overlay is written out.
#[derive(Debug, Clone)]
pub struct RadarOutput {
    pub path: PathBuf,
    /// Static last-frame composite (PNG) instead of the animated loop.
    pub still: bool,
}

impl Default for RadarOutput {
    fn default() -> Self {
        Self { path: PathBuf::from("radar_overlay.gif"), still: false }
    }
}

impl RadarOutput {
    fn resolved_path(&self) -> PathBuf {
        if self.still && self.path.extension().is_none_or(|ext| ext != "png") {
            self.path.with_extension("png")
        } else {
            self.path.clone()
        }
    }
}

/// What the user got to see for one action.
#[derive(Debug)]
pub enum Shown {
    Text,
    Radar(OverlayView),
    Failed,
}

impl Shown {
    pub fn succeeded(&self) -> bool {
        !matches!(self, Shown::Failed)
    }

    pub fn into_view(self) -> Option<OverlayView> {
        match self {
            Shown::Radar(view) => Some(view),
            Shown::Text | Shown::Failed => None,
        }
    }
}

/// Print a text outcome or write a radar overlay.
///
/// Every failure, from the action or from writing the overlay, is reported
/// here and nowhere else.
pub fn present(result: Result<ActionOutcome, ActionError>, output: &RadarOutput) -> Shown {
    match result {
        Ok(ActionOutcome::Text(text)) => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            Shown::Text
        }
        Ok(ActionOutcome::Radar(view)) => {
            let path = output.resolved_path();
            match write_overlay(&view, &path, output.still) {
                Ok(()) => {
                    println!("Radar overlay written to {}", path.display());
                    Shown::Radar(view)
                }
                Err(e) => {
                    tracing::debug!("{e:#}");
                    eprintln!("Error: {e}");
                    close(view);
                    Shown::Failed
                }
            }
        }
        Err(e) => {
            report(&e);
            Shown::Failed
        }
    }
}

fn write_overlay(view: &OverlayView, path: &Path, still: bool) -> Result<()> {
    let canvas = view.canvas();
    let written = if still { canvas.write_still(path) } else { canvas.write_animation(path) };
    written.with_context(|| format!("Failed to write radar overlay to {}", path.display()))
}

/// Close notification for a radar view.
pub fn close(view: OverlayView) {
    if let Err(e) = view.close() {
        tracing::warn!("failed to remove radar file {}: {e}", view.radar_file().display());
    }
}

fn report(err: &ActionError) {
    tracing::debug!(action = %err.action, "{err:#}");
    eprintln!("Error: {}", err.user_message());
}
