//! Radar loop download, temp-file ownership and frame decoding.

use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufRead, BufReader, Seek},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use image::{AnimationDecoder, codecs::gif::GifDecoder};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::instrument;

use crate::{
    config::Config,
    error::{Stage, WeatherError},
    http,
    model::{RadarFrame, StationId},
};

/// Tracks radar files that are still on disk so an interrupted process can
/// remove them before exiting.
#[derive(Debug, Clone, Default)]
pub struct TempFileRegistry {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl TempFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, path: &Path) {
        self.paths.lock().insert(path.to_path_buf());
    }

    fn release(&self, path: &Path) {
        self.paths.lock().remove(path);
    }

    pub fn outstanding(&self) -> Vec<PathBuf> {
        self.paths.lock().iter().cloned().collect()
    }

    /// Delete every outstanding file. Returns how many were removed.
    pub fn purge(&self) -> usize {
        let paths: Vec<PathBuf> = self.paths.lock().drain().collect();
        let mut removed = 0;
        for path in paths {
            match remove_if_exists(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(path = %path.display(), "failed to remove radar file: {e}"),
            }
        }
        if removed > 0 {
            tracing::info!(removed, "purged outstanding radar files");
        }
        removed
    }
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Per-invocation token that keeps radar file names unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// `{pid}-{unix millis}-{counter}`; unique within and across processes.
    pub fn generate() -> Self {
        let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("{}-{millis}-{n}", std::process::id()))
    }

    /// Accepts ASCII letters, digits and `-` only.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// File name for a station's radar loop within one session.
pub fn radar_file_name(station: &StationId, session: &SessionToken) -> String {
    format!("{station}_loop-{}.gif", session.as_str())
}

/// Owned handle to a downloaded radar loop on disk.
///
/// Deleting is idempotent and also happens on drop.
#[derive(Debug)]
pub struct RadarFile {
    path: PathBuf,
    registry: TempFileRegistry,
    deleted: AtomicBool,
}

impl RadarFile {
    fn new(path: PathBuf, registry: TempFileRegistry) -> Self {
        registry.register(&path);
        Self { path, registry, deleted: AtomicBool::new(false) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Remove the file. Returns `true` only for the call that removed it.
    pub fn delete(&self) -> io::Result<bool> {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.registry.release(&self.path);
        let removed = remove_if_exists(&self.path)?;
        tracing::debug!(path = %self.path.display(), removed, "radar file deleted");
        Ok(removed)
    }
}

impl Drop for RadarFile {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            tracing::warn!(path = %self.path.display(), "failed to remove radar file: {e}");
        }
    }
}

/// Decoded frames plus the file they came from.
#[derive(Debug)]
pub struct RadarDownload {
    pub station: StationId,
    pub frames: Vec<RadarFrame>,
    pub file: RadarFile,
}

/// Decode every frame of an animated GIF into RGBA.
pub fn decode_frames<R: BufRead + Seek>(reader: R) -> Result<Vec<RadarFrame>, image::ImageError> {
    let decoder = GifDecoder::new(reader)?;
    let frames = decoder.into_frames().collect_frames()?;

    Ok(frames
        .into_iter()
        .map(|frame| {
            let delay = Duration::from(frame.delay());
            RadarFrame { image: frame.into_buffer(), delay }
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct RadarFetcher {
    http: Client,
    url_template: String,
    temp_dir: PathBuf,
    registry: TempFileRegistry,
}

impl RadarFetcher {
    pub fn new(config: &Config, registry: TempFileRegistry) -> Result<Self, WeatherError> {
        let http = http::build_client(&config.user_agent, config.http_timeout())
            .map_err(|source| WeatherError::Transport { stage: Stage::Radar, source })?;

        Ok(Self::with_client(
            http,
            &config.radar.url_template,
            config.radar_temp_dir(),
            registry,
        ))
    }

    pub fn with_client(
        http: Client,
        url_template: &str,
        temp_dir: PathBuf,
        registry: TempFileRegistry,
    ) -> Self {
        Self { http, url_template: url_template.to_string(), temp_dir, registry }
    }

    pub fn registry(&self) -> &TempFileRegistry {
        &self.registry
    }

    pub fn image_url(&self, station: &StationId) -> String {
        self.url_template.replace("{station}", station.as_str())
    }

    pub fn file_path(&self, station: &StationId, session: &SessionToken) -> PathBuf {
        self.temp_dir.join(radar_file_name(station, session))
    }

    /// Download, persist and decode a station's radar loop.
    #[instrument(skip(self, station), fields(station = %station), level = "info")]
    pub async fn fetch(
        &self,
        station: &StationId,
        session: &SessionToken,
    ) -> Result<RadarDownload, WeatherError> {
        let download_error = |status: Option<u16>| WeatherError::RadarDownload {
            station: station.to_string(),
            status,
        };

        let url = self.image_url(station);
        tracing::debug!(%url, "downloading radar loop");

        let response = self.http.get(&url).send().await.map_err(|e| {
            tracing::warn!("radar request failed: {e}");
            download_error(None)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "radar image source returned error status");
            return Err(download_error(Some(status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| {
            tracing::warn!("radar body could not be read: {e}");
            download_error(None)
        })?;

        let file = RadarFile::new(self.file_path(station, session), self.registry.clone());
        tokio::fs::write(file.path(), &bytes).await?;
        tracing::debug!(path = %file.path().display(), size = bytes.len(), "radar loop saved");

        let path = file.path().to_path_buf();
        let decoded = tokio::task::spawn_blocking(move || {
            let reader = BufReader::new(File::open(&path)?);
            decode_frames(reader).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        })
        .await
        .map_err(|e| io::Error::other(e.to_string()))
        .and_then(|result| result);

        let frames = match decoded {
            Ok(frames) if !frames.is_empty() => frames,
            Ok(_) => return Err(self.decode_failed(station, file, "no frames".to_string())),
            Err(e) => return Err(self.decode_failed(station, file, e.to_string())),
        };

        tracing::info!(frames = frames.len(), "radar loop decoded");
        Ok(RadarDownload { station: station.clone(), frames, file })
    }

    fn decode_failed(&self, station: &StationId, file: RadarFile, reason: String) -> WeatherError {
        tracing::warn!(%station, "radar image could not be decoded: {reason}");
        if let Err(e) = file.delete() {
            tracing::warn!("failed to remove undecodable radar file: {e}");
        }
        WeatherError::RadarDecode { station: station.to_string(), reason }
    }
}
