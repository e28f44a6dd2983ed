//! `yt-dlp` backed media fetcher and URL helpers for YouTube links.

use regex::Regex;
use serenity::async_trait;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use super::track_metadata::MediaInfo;
use super::{MediaFetcher, find_media_file};
use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

/// Shape of a YouTube video id.
static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w-]{6,}$").unwrap());

/// Fetches metadata and audio by shelling out to `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: String,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }
}

impl YtDlpFetcher {
    /// Use a specific `yt-dlp` executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        // A caller-side timeout drops the future; take the child down with it
        command.kill_on_drop(true);
        command
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(&self, url: &str) -> MusicResult<MediaInfo> {
        debug!("Probing metadata for {}", url);

        let output = self
            .command()
            .args([
                "-j",            // Output as JSON
                "--no-playlist", // Don't process playlists
                url,
            ])
            .output()
            .await
            .map_err(|e| MusicError::FetchFailed(format!("Failed to run yt-dlp: {}", e)))?;

        MediaInfo::try_from(output)
    }

    async fn download(&self, url: &str, dir: &Path, stem: &str) -> MusicResult<PathBuf> {
        info!("Downloading {} to {}", url, dir.display());

        let template = dir.join(format!("{}.%(ext)s", stem));
        let output = self
            .command()
            .arg("--quiet")
            .arg("--no-playlist")
            .args(["-f", "bestaudio/best"])
            .arg("-o")
            .arg(&template)
            .arg(url)
            .output()
            .await
            .map_err(|e| MusicError::FetchFailed(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::FetchFailed(format!(
                "Download failed: {}",
                stderr.trim()
            )));
        }

        // The extension depends on the format yt-dlp picked
        find_media_file(dir, stem).await.ok_or_else(|| {
            MusicError::FetchFailed(format!("Downloaded file for {} not found", url))
        })
    }
}

/// Checks if the URL points at YouTube.
pub fn is_youtube_url(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be")
    )
}

/// Extract the video id from a watch, short link or shorts URL.
pub fn video_id(url: &Url) -> Option<String> {
    if !is_youtube_url(url) {
        return None;
    }

    let candidate = if url.host_str() == Some("youtu.be") {
        url.path_segments()?.next().map(str::to_string)
    } else if url.path() == "/watch" {
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    } else {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("shorts" | "embed" | "live") => segments.next().map(str::to_string),
            _ => None,
        }
    }?;

    VIDEO_ID_REGEX
        .is_match(&candidate)
        .then_some(candidate)
}

/// Playlist links: a `list` parameter or a `/playlist` path.
pub fn is_playlist(url: &Url) -> bool {
    url.path().starts_with("/playlist") || url.query_pairs().any(|(key, _)| key == "list")
}

/// Links that start playback at an offset.
pub fn has_timestamp(url: &Url) -> bool {
    url.query_pairs().any(|(key, _)| key == "t")
        || url.fragment().is_some_and(|f| f.starts_with("t="))
}
