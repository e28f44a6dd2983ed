//! Turns play requests into playable audio items.
//!
//! Local assets are wrapped as direct items. Remote URLs are validated,
//! probed, checked against the duration and live-stream policy, and then
//! downloaded into the server's own media directory as queued items.
//! A media id that already has a file in that directory is never fetched
//! again.

/// Submodule defining the metadata types used while fetching remote media.
pub mod track_metadata;
/// Submodule implementing the `MediaFetcher` trait with `yt-dlp`.
pub mod youtube;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use serenity::async_trait;
use serenity::model::id::{GuildId, UserId};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::commands::music::utils::format_duration;
use crate::commands::music::utils::music_manager::{MusicError, MusicResult};
use crate::config::{LivePolicy, PlayerConfig};
use crate::utils::database::{Playable, SoundKind};
pub use track_metadata::{MediaInfo, MediaRecord};
pub use youtube::YtDlpFetcher;

/// Everything that is not a word character is stripped from media ids.
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w]").unwrap());

/// Where the audio for an item comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A file on local disk.
    File(PathBuf),
    /// A live stream played straight from its page URL.
    Stream(Url),
}

/// One playable unit. Only the start time changes once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioItem {
    name: String,
    source: AudioSource,
    origin_url: Option<Url>,
    queued: bool,
    requester: UserId,
    requested_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
}

impl AudioItem {
    /// A one-shot item that preempts freely and never enters the queue.
    pub fn direct(name: impl Into<String>, path: impl Into<PathBuf>, requester: UserId) -> Self {
        Self {
            name: name.into(),
            source: AudioSource::File(path.into()),
            origin_url: None,
            queued: false,
            requester,
            requested_at: Utc::now(),
            started_at: None,
        }
    }

    /// An item that takes part in FIFO ordering and vote protection.
    pub fn queued(
        name: impl Into<String>,
        source: AudioSource,
        origin_url: Option<Url>,
        requester: UserId,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            origin_url,
            queued: true,
            requester,
            requested_at: Utc::now(),
            started_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    pub fn origin_url(&self) -> Option<&Url> {
        self.origin_url.as_ref()
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn requester(&self) -> UserId {
        self.requester
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// When the item last began streaming.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }
}

/// What a caller wants played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayRequest {
    /// An archived sound file, relative to the server's media directory.
    LocalAsset { name: String, path: PathBuf },
    /// A remote media page.
    RemoteUrl(String),
}

impl From<Playable> for PlayRequest {
    fn from(playable: Playable) -> Self {
        match playable.kind {
            SoundKind::Local => PlayRequest::LocalAsset {
                name: playable.name,
                path: PathBuf::from(playable.reference),
            },
            SoundKind::Remote => PlayRequest::RemoteUrl(playable.reference),
        }
    }
}

/// Metadata probe and download for remote media.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch metadata for `url` without downloading it.
    async fn probe(&self, url: &str) -> MusicResult<MediaInfo>;

    /// Download the audio of `url` into `dir` using `stem` as the file stem,
    /// returning the path of the written file.
    async fn download(&self, url: &str, dir: &Path, stem: &str) -> MusicResult<PathBuf>;
}

/// Resolves play requests for every server.
pub struct AudioResolver {
    fetcher: Arc<dyn MediaFetcher>,
    media_root: PathBuf,
    max_duration: Duration,
    live_policy: LivePolicy,
    fetch_timeout: Duration,
    in_flight: DashSet<(GuildId, String)>,
}

/// Marks a download as running until dropped.
struct InFlight<'a> {
    downloads: &'a DashSet<(GuildId, String)>,
    key: (GuildId, String),
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.downloads.remove(&self.key);
    }
}

impl AudioResolver {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        media_root: impl Into<PathBuf>,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            fetcher,
            media_root: media_root.into(),
            max_duration: config.max_duration,
            live_policy: config.live_policy,
            fetch_timeout: config.fetch_timeout,
            in_flight: DashSet::new(),
        }
    }

    /// The directory holding `guild_id`'s media.
    pub fn media_dir(&self, guild_id: GuildId) -> PathBuf {
        self.media_root.join(guild_id.to_string())
    }

    pub async fn resolve(
        &self,
        guild_id: GuildId,
        requester: UserId,
        request: PlayRequest,
    ) -> MusicResult<AudioItem> {
        match request {
            PlayRequest::LocalAsset { name, path } => {
                self.resolve_local(guild_id, requester, name, path).await
            }
            PlayRequest::RemoteUrl(url) => self.resolve_remote(guild_id, requester, &url).await,
        }
    }

    async fn resolve_local(
        &self,
        guild_id: GuildId,
        requester: UserId,
        name: String,
        path: PathBuf,
    ) -> MusicResult<AudioItem> {
        let stays_inside = path
            .components()
            .all(|part| matches!(part, Component::Normal(_) | Component::CurDir));
        if !stays_inside {
            warn!("Sound '{}' points outside the media directory", name);
            return Err(MusicError::InvalidRequest(format!(
                "The file for '{}' must live in this server's media directory",
                name
            )));
        }
        let path = self.media_dir(guild_id).join(path);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(AudioItem::direct(name, path, requester)),
            _ => {
                warn!("Sound '{}' points at missing file {}", name, path.display());
                Err(MusicError::InvalidRequest(format!(
                    "The file for '{}' is missing",
                    name
                )))
            }
        }
    }

    async fn resolve_remote(
        &self,
        guild_id: GuildId,
        requester: UserId,
        raw: &str,
    ) -> MusicResult<AudioItem> {
        let url = validate_url(raw)?;
        let dir = self.media_dir(guild_id);

        // Known links and YouTube ids are caught before any network access
        check_url_not_downloaded(&dir, &url).await?;
        if let Some(id) = youtube::video_id(&url) {
            check_not_downloaded(&dir, &sanitize_media_id(&id)).await?;
        }

        let info = tokio::time::timeout(self.fetch_timeout, self.fetcher.probe(url.as_str()))
            .await
            .map_err(|_| MusicError::FetchFailed("Timed out fetching metadata".to_string()))??;

        if info.is_playlist {
            return Err(MusicError::InvalidRequest(
                "No playlists allowed!".to_string(),
            ));
        }

        if info.is_live {
            return match self.live_policy {
                LivePolicy::Stream => {
                    info!("Streaming live media '{}' without caching", info.title);
                    Ok(AudioItem::queued(
                        info.title,
                        AudioSource::Stream(url.clone()),
                        Some(url),
                        requester,
                    ))
                }
                LivePolicy::Reject => Err(MusicError::MediaRejected(
                    "Live streams are not allowed".to_string(),
                )),
            };
        }

        self.check_duration(&info)?;

        let stem = sanitize_media_id(&info.id);
        if stem.is_empty() {
            return Err(MusicError::FetchFailed(format!(
                "'{}' has no usable media id",
                info.title
            )));
        }

        check_not_downloaded(&dir, &stem).await?;
        let _claim = self
            .claim(guild_id, &stem)
            .ok_or_else(|| MusicError::AlreadyDownloaded(info.title.clone()))?;
        // Another download may have finished between the check and the claim
        check_not_downloaded(&dir, &stem).await?;

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            MusicError::FetchFailed(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let path = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.download(url.as_str(), &dir, &stem),
        )
        .await
        .map_err(|_| MusicError::FetchFailed("Timed out downloading media".to_string()))??;

        let record = MediaRecord {
            title: info.title.clone(),
            url: url.to_string(),
            duration: info.duration,
        };
        if let Err(e) = record.store(&dir, &stem).await {
            warn!("Downloaded '{}' but could not record it: {}", info.title, e);
        }

        info!("Downloaded '{}' to {}", info.title, path.display());
        Ok(AudioItem::queued(
            info.title,
            AudioSource::File(path),
            Some(url),
            requester,
        ))
    }

    fn check_duration(&self, info: &MediaInfo) -> MusicResult<()> {
        match info.duration {
            None => Err(MusicError::MediaRejected(format!(
                "'{}' does not report a duration",
                info.title
            ))),
            Some(duration) if duration > self.max_duration => {
                Err(MusicError::MediaRejected(format!(
                    "'{}' is {} long, the limit is {}",
                    info.title,
                    format_duration(duration),
                    format_duration(self.max_duration)
                )))
            }
            Some(_) => Ok(()),
        }
    }

    fn claim(&self, guild_id: GuildId, stem: &str) -> Option<InFlight<'_>> {
        let key = (guild_id, stem.to_string());
        if self.in_flight.insert(key.clone()) {
            Some(InFlight {
                downloads: &self.in_flight,
                key,
            })
        } else {
            debug!("Download of {} already running in guild {}", stem, guild_id);
            None
        }
    }
}

/// Parse and vet a remote URL before anything is fetched.
fn validate_url(raw: &str) -> MusicResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|_| MusicError::InvalidRequest(format!("'{}' is not a valid URL", raw)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(MusicError::InvalidRequest(
            "Only http and https links are supported".to_string(),
        ));
    }
    if youtube::is_playlist(&url) {
        return Err(MusicError::InvalidRequest(
            "No playlists allowed!".to_string(),
        ));
    }
    if youtube::has_timestamp(&url) {
        return Err(MusicError::InvalidRequest(
            "No timestamps allowed!".to_string(),
        ));
    }

    Ok(url)
}

pub fn sanitize_media_id(id: &str) -> String {
    NON_WORD.replace_all(id, "").into_owned()
}

/// Fail with `AlreadyDownloaded` if `dir` already holds media for `stem`.
async fn check_not_downloaded(dir: &Path, stem: &str) -> MusicResult<()> {
    if find_media_file(dir, stem).await.is_none() {
        return Ok(());
    }

    let name = MediaRecord::load(dir, stem)
        .await
        .map(|record| record.title)
        .unwrap_or_else(|| stem.to_string());
    debug!("'{}' is already downloaded in {}", name, dir.display());
    Err(MusicError::AlreadyDownloaded(name))
}

/// Fail with `AlreadyDownloaded` if a download recorded for `url` is still
/// in `dir`.
async fn check_url_not_downloaded(dir: &Path, url: &Url) -> MusicResult<()> {
    let Some((stem, record)) = MediaRecord::find_by_url(dir, url.as_str()).await else {
        return Ok(());
    };
    if find_media_file(dir, &stem).await.is_none() {
        return Ok(());
    }

    debug!("{} is already downloaded as {}", url, stem);
    Err(MusicError::AlreadyDownloaded(record.title))
}

/// Find the media file named `<stem>.<ext>` in `dir`, ignoring partial
/// downloads and sidecars.
pub(crate) async fn find_media_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let stem_matches = path.file_stem().is_some_and(|s| s == stem);
        let is_partial = path.extension().is_some_and(|ext| ext == "part");
        if stem_matches && !is_partial && path.is_file() {
            return Some(path);
        }
    }

    None
}
