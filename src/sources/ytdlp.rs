use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{PageSpec, PlaylistEntry, ResolvedStream, TrackResolver};
use crate::audio::state::Track;
use crate::error::ResolveError;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// [`TrackResolver`] backed by the `yt-dlp` binary's JSON output.
pub struct YtDlpResolver {
    binary: PathBuf,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Runs yt-dlp with `-J` and returns its stdout.
    async fn dump_json(&self, args: &[&str], target: &str) -> Result<Vec<u8>, ResolveError> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args([
            "-J",
            "--no-warnings",
            "--ignore-errors",
            "--format",
            "m4a/bestaudio/best",
            "--socket-timeout",
            "30",
        ])
        .args(args)
        .arg(target)
        .kill_on_drop(true);

        debug!("yt-dlp {:?} {}", args, target);
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ResolveError::Timeout {
                seconds: self.timeout.as_secs(),
            })??;

        // With --ignore-errors yt-dlp can exit non-zero while still printing
        // usable JSON for the entries that worked.
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extractor {
                message: stderr.trim().lines().last().unwrap_or("no output").to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    requested_formats: Vec<FormatInfo>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
    #[serde(default)]
    entries: Vec<Option<VideoInfo>>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    url: Option<String>,
    acodec: Option<String>,
}

impl VideoInfo {
    /// Search and playlist URLs wrap the video in `entries`.
    fn first_entry(self) -> Option<VideoInfo> {
        if self.kind.as_deref() == Some("playlist") || !self.entries.is_empty() {
            self.entries.into_iter().flatten().next()
        } else {
            Some(self)
        }
    }

    fn stream_url(&self) -> Option<String> {
        if let Some(url) = non_empty(self.url.as_deref()) {
            return Some(url.to_string());
        }
        self.requested_formats
            .iter()
            .chain(self.formats.iter().rev())
            .filter(|f| f.has_audio())
            .find_map(|f| non_empty(f.url.as_deref()).map(str::to_string))
    }

    fn page_url(&self) -> Option<String> {
        non_empty(self.webpage_url.as_deref())
            .or_else(|| non_empty(self.url.as_deref()))
            .map(str::to_string)
            .or_else(|| non_empty(self.id.as_deref()).map(|id| format!("{WATCH_URL}{id}")))
    }
}

impl FormatInfo {
    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|codec| codec != "none")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_stream(json: &[u8], locator: &str) -> Result<ResolvedStream, ResolveError> {
    let info = serde_json::from_slice::<VideoInfo>(json)?
        .first_entry()
        .ok_or_else(|| ResolveError::NoData {
            locator: locator.to_string(),
        })?;

    let stream_url = info.stream_url().ok_or_else(|| ResolveError::NoStream {
        locator: locator.to_string(),
    })?;
    Ok(ResolvedStream {
        title: info.title.unwrap_or_else(|| locator.to_string()),
        stream_url,
    })
}

fn parse_search(json: &[u8], query: &str) -> Result<Track, ResolveError> {
    let info = serde_json::from_slice::<VideoInfo>(json)?
        .first_entry()
        .ok_or_else(|| ResolveError::NoResults {
            query: query.to_string(),
        })?;

    let locator = info.page_url().ok_or_else(|| ResolveError::NoResults {
        query: query.to_string(),
    })?;
    let title = info.title.unwrap_or_else(|| query.to_string());
    Ok(Track::new(title, locator))
}

/// Unavailable entries come back as `null` or without a title; they map to
/// empty entries so the caller can count them.
fn parse_playlist(json: &[u8]) -> Result<Vec<PlaylistEntry>, ResolveError> {
    let info: VideoInfo = serde_json::from_slice(json)?;
    Ok(info
        .entries
        .into_iter()
        .map(|entry| match entry {
            Some(entry) => PlaylistEntry {
                locator: entry.page_url().unwrap_or_default(),
                original_url: entry.webpage_url.clone(),
                title: entry.title.unwrap_or_default(),
            },
            None => PlaylistEntry::default(),
        })
        .collect())
}

fn playlist_items_arg(page: PageSpec) -> [String; 2] {
    match page.end {
        Some(end) => ["--playlist-items".to_string(), format!("{}-{}", page.start, end)],
        None => ["--playlist-start".to_string(), page.start.to_string()],
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve_single(&self, locator: &str) -> Result<ResolvedStream, ResolveError> {
        let json = self.dump_json(&["--no-playlist"], locator).await?;
        parse_stream(&json, locator)
    }

    async fn resolve_search(&self, query: &str) -> Result<Track, ResolveError> {
        let json = self
            .dump_json(&["--no-playlist"], &format!("ytsearch1:{query}"))
            .await?;
        let track = parse_search(&json, query)?;
        info!("🔍 \"{}\" → {}", query, track.title);
        Ok(track)
    }

    async fn resolve_playlist_page(
        &self,
        locator: &str,
        page: PageSpec,
    ) -> Result<Vec<PlaylistEntry>, ResolveError> {
        let [flag, value] = playlist_items_arg(page);
        let json = self
            .dump_json(&["--flat-playlist", "--yes-playlist", flag.as_str(), value.as_str()], locator)
            .await?;
        parse_playlist(&json)
    }
}
