//! Projects decoded radar frames onto a basemap canvas.

use std::{fmt, fs::File, io, io::BufWriter, path::Path, time::Duration};

use image::{
    Delay, Frame, ImageFormat, Rgba, RgbaImage,
    codecs::gif::{GifEncoder, Repeat},
    imageops::{self, FilterType},
};
use serde::{Deserialize, Serialize};

use crate::{
    config::RadarConfig,
    error::WeatherError,
    model::RadarFrame,
    radar::RadarFile,
};

const OCEAN: Rgba<u8> = Rgba([198, 219, 239, 255]);
const GRATICULE: Rgba<u8> = Rgba([150, 150, 150, 255]);
const GRATICULE_STEP_DEG: f64 = 30.0;
/// Frames with no delay in the source loop are shown for this long.
const FALLBACK_FRAME_DELAY: Duration = Duration::from_millis(500);
/// Web Mercator is undefined at the poles.
const MERCATOR_MAX_LAT: f64 = 85.051_128_78;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Plate carrée: longitude and latitude map linearly to x and y.
    #[default]
    Equirectangular,
    WebMercator,
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::Equirectangular => "equirectangular",
            Projection::WebMercator => "web_mercator",
        }
    }

    /// Projected (x, y) in degree-like units.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Equirectangular => (lon, lat),
            Projection::WebMercator => {
                let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
                let y = (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
                (lon, y.to_degrees())
            }
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoExtent {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoExtent {
    pub const WORLD: GeoExtent =
        GeoExtent { min_lon: -180.0, min_lat: -90.0, max_lon: 180.0, max_lat: 90.0 };

    pub fn is_valid(&self) -> bool {
        self.min_lon < self.max_lon
            && self.min_lat < self.max_lat
            && self.min_lon >= -180.0
            && self.max_lon <= 180.0
            && self.min_lat >= -90.0
            && self.max_lat <= 90.0
    }
}

/// Canvas pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Projection, extent and canvas size of the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basemap {
    projection: Projection,
    extent: GeoExtent,
    width: u32,
    height: u32,
}

impl Basemap {
    pub fn new(
        projection: Projection,
        extent: GeoExtent,
        width: u32,
        height: u32,
    ) -> Result<Self, WeatherError> {
        if !extent.is_valid() {
            return Err(WeatherError::Render(format!("invalid map extent {extent:?}")));
        }
        if width == 0 || height == 0 {
            return Err(WeatherError::Render("canvas must be at least 1x1".to_string()));
        }
        Ok(Self { projection, extent, width, height })
    }

    pub fn extent(&self) -> GeoExtent {
        self.extent
    }

    /// Canvas pixel position of a geographic point (origin top-left).
    pub fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x0, y0) = self.projection.project(self.extent.min_lon, self.extent.min_lat);
        let (x1, y1) = self.projection.project(self.extent.max_lon, self.extent.max_lat);
        let (x, y) = self.projection.project(lon, lat);

        let px = (x - x0) / (x1 - x0) * f64::from(self.width);
        let py = (y1 - y) / (y1 - y0) * f64::from(self.height);
        (px, py)
    }

    /// Pixel rectangle covered by a geographic extent.
    pub fn pixel_bounds(&self, extent: &GeoExtent) -> PixelRect {
        let (left, top) = self.to_pixel(extent.min_lon, extent.max_lat);
        let (right, bottom) = self.to_pixel(extent.max_lon, extent.min_lat);

        PixelRect {
            x: left.round() as i64,
            y: top.round() as i64,
            width: (right - left).round().max(1.0) as u32,
            height: (bottom - top).round().max(1.0) as u32,
        }
    }

    /// Ocean fill with a graticule drawn through the projection.
    pub fn draw(&self) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(self.width, self.height, OCEAN);

        let mut lon = (self.extent.min_lon / GRATICULE_STEP_DEG).ceil() * GRATICULE_STEP_DEG;
        while lon <= self.extent.max_lon {
            let (px, _) = self.to_pixel(lon, self.extent.min_lat);
            let col = (px.round() as u32).min(self.width - 1);
            for row in 0..self.height {
                img.put_pixel(col, row, GRATICULE);
            }
            lon += GRATICULE_STEP_DEG;
        }

        let mut lat = (self.extent.min_lat / GRATICULE_STEP_DEG).ceil() * GRATICULE_STEP_DEG;
        while lat <= self.extent.max_lat {
            let (_, py) = self.to_pixel(self.extent.min_lon, lat);
            let row = (py.round() as u32).min(self.height - 1);
            for col in 0..self.width {
                img.put_pixel(col, row, GRATICULE);
            }
            lat += GRATICULE_STEP_DEG;
        }

        img
    }
}

/// A radar frame resized to its place on the canvas.
#[derive(Debug, Clone)]
pub struct ProjectedFrame {
    pub image: RgbaImage,
    pub bounds: PixelRect,
    pub delay: Duration,
}

/// Basemap plus projected frames, in animation order.
#[derive(Debug, Clone)]
pub struct OverlayCanvas {
    background: RgbaImage,
    frames: Vec<ProjectedFrame>,
}

impl OverlayCanvas {
    pub fn frames(&self) -> &[ProjectedFrame] {
        &self.frames
    }

    /// Every frame drawn over the basemap in order; the last frame ends on top.
    pub fn composite(&self) -> RgbaImage {
        let mut img = self.background.clone();
        for frame in &self.frames {
            imageops::overlay(&mut img, &frame.image, frame.bounds.x, frame.bounds.y);
        }
        img
    }

    /// One basemap composite per radar frame, for timed playback.
    pub fn animation_frames(&self) -> Vec<Frame> {
        self.frames
            .iter()
            .map(|frame| {
                let mut img = self.background.clone();
                imageops::overlay(&mut img, &frame.image, frame.bounds.x, frame.bounds.y);
                let delay = if frame.delay.is_zero() { FALLBACK_FRAME_DELAY } else { frame.delay };
                Frame::from_parts(img, 0, 0, Delay::from_saturating_duration(delay))
            })
            .collect()
    }

    /// Write a looping animated GIF of the overlay.
    pub fn write_animation(&self, path: &Path) -> Result<(), WeatherError> {
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = GifEncoder::new(file);
        encoder.set_repeat(Repeat::Infinite).map_err(render_error)?;
        encoder.encode_frames(self.animation_frames()).map_err(render_error)?;
        Ok(())
    }

    /// Write the static composite as PNG.
    pub fn write_still(&self, path: &Path) -> Result<(), WeatherError> {
        self.composite().save_with_format(path, ImageFormat::Png).map_err(render_error)
    }
}

fn render_error(e: image::ImageError) -> WeatherError {
    match e {
        image::ImageError::IoError(io) => WeatherError::Io(io),
        other => WeatherError::Render(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct GeoRasterOverlay {
    basemap: Basemap,
}

impl GeoRasterOverlay {
    pub fn new(basemap: Basemap) -> Self {
        Self { basemap }
    }

    /// Whole-globe basemap with the configured projection and canvas size.
    pub fn from_config(config: &RadarConfig) -> Result<Self, WeatherError> {
        let basemap = Basemap::new(
            config.projection,
            GeoExtent::WORLD,
            config.canvas_width,
            config.canvas_height,
        )?;
        Ok(Self::new(basemap))
    }

    /// Map every frame onto the basemap's full extent, keeping frame order.
    pub fn render(&self, frames: &[RadarFrame]) -> Result<OverlayCanvas, WeatherError> {
        if frames.is_empty() {
            return Err(WeatherError::Render("no radar frames to draw".to_string()));
        }

        let bounds = self.basemap.pixel_bounds(&self.basemap.extent());
        let projected = frames
            .iter()
            .map(|frame| ProjectedFrame {
                image: imageops::resize(&frame.image, bounds.width, bounds.height, FilterType::Nearest),
                bounds,
                delay: frame.delay,
            })
            .collect();

        tracing::debug!(frames = frames.len(), ?bounds, "radar frames projected");
        Ok(OverlayCanvas { background: self.basemap.draw(), frames: projected })
    }
}

/// A rendered overlay and the radar file it was made from.
///
/// Closing the view deletes the file; closing again does nothing.
#[derive(Debug)]
pub struct OverlayView {
    canvas: OverlayCanvas,
    radar_file: RadarFile,
}

impl OverlayView {
    pub fn new(canvas: OverlayCanvas, radar_file: RadarFile) -> Self {
        Self { canvas, radar_file }
    }

    pub fn canvas(&self) -> &OverlayCanvas {
        &self.canvas
    }

    pub fn radar_file(&self) -> &Path {
        self.radar_file.path()
    }

    pub fn is_closed(&self) -> bool {
        self.radar_file.is_deleted()
    }

    /// Close notification from the display surface.
    pub fn close(&self) -> io::Result<()> {
        if self.radar_file.delete()? {
            tracing::info!(path = %self.radar_file.path().display(), "overlay closed, radar file removed");
        }
        Ok(())
    }
}
