//! Metadata for remote media: what a probe reports, and the sidecar record
//! written next to every downloaded file.

use crate::commands::music::utils::music_manager::MusicError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tracing::warn;

/// What a metadata probe reports about one remote media item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    /// Host-assigned id, unsanitised.
    pub id: String,
    pub title: String,
    pub duration: Option<Duration>,
    pub is_live: bool,
    pub is_playlist: bool,
}

impl MediaInfo {
    /// Parse the JSON printed by `yt-dlp -j`.
    pub fn from_json(json: &str) -> Result<Self, MusicError> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            MusicError::FetchFailed(format!("Failed to parse media metadata: {}", e))
        })?;

        let id = value["id"]
            .as_str()
            .ok_or_else(|| MusicError::FetchFailed("Media metadata has no id".to_string()))?
            .to_string();

        let title = value["title"].as_str().unwrap_or("Unknown Title").to_string();

        let duration = value["duration"]
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        let is_live = value["is_live"].as_bool().unwrap_or(false)
            || value["live_status"].as_str() == Some("is_live");

        let is_playlist = value["_type"].as_str() == Some("playlist");

        Ok(Self {
            id,
            title,
            duration,
            is_live,
            is_playlist,
        })
    }
}

/// Converts the output of `yt-dlp -j` into `MediaInfo`.
impl TryFrom<Output> for MediaInfo {
    type Error = MusicError;

    fn try_from(value: Output) -> Result<Self, Self::Error> {
        if !value.status.success() {
            let stderr = String::from_utf8_lossy(&value.stderr);
            return Err(MusicError::FetchFailed(format!(
                "Metadata probe failed: {}",
                stderr.trim()
            )));
        }

        Self::from_json(&String::from_utf8_lossy(&value.stdout))
    }
}

/// Sidecar stored as `<id>.info.json` next to a downloaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRecord {
    pub title: String,
    pub url: String,
    #[serde(with = "humantime_serde", default)]
    pub duration: Option<Duration>,
}

impl MediaRecord {
    pub fn path_for(dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{}.info.json", stem))
    }

    /// Read the sidecar for `stem`, if there is a readable one.
    pub async fn load(dir: &Path, stem: &str) -> Option<Self> {
        let path = Self::path_for(dir, stem);
        let contents = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Ignoring unreadable sidecar {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Find the sidecar in `dir` recorded for `url`, with the stem it was
    /// stored under.
    pub async fn find_by_url(dir: &Path, url: &str) -> Option<(String, Self)> {
        let mut entries = tokio::fs::read_dir(dir).await.ok()?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".info.json"))
            else {
                continue;
            };
            if let Some(record) = Self::load(dir, stem).await {
                if record.url == url {
                    return Some((stem.to_string(), record));
                }
            }
        }

        None
    }

    pub async fn store(&self, dir: &Path, stem: &str) -> Result<(), MusicError> {
        let path = Self::path_for(dir, stem);
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| MusicError::FetchFailed(format!("Failed to encode sidecar: {}", e)))?;
        tokio::fs::write(&path, contents).await.map_err(|e| {
            MusicError::FetchFailed(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}
