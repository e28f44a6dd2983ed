//! Hand-written fakes for the voice platform and media fetching.

use jukebot::{
    AudioSource, MediaFetcher, MediaInfo, MusicError, MusicResult, Presence, TrackEndSignal,
    VoiceConnection, VoiceGateway,
};
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the fake voice transport was asked to do.
#[derive(Default)]
pub struct VoiceLog {
    pub connects: Vec<ChannelId>,
    pub moves: Vec<ChannelId>,
    pub played: Vec<String>,
    pub signals: Vec<TrackEndSignal>,
    pub stops: usize,
    pub disconnects: usize,
}

#[derive(Clone, Default)]
pub struct SharedLog(Arc<Mutex<VoiceLog>>);

impl SharedLog {
    pub fn with<T>(&self, f: impl FnOnce(&mut VoiceLog) -> T) -> T {
        f(&mut self.0.lock().unwrap())
    }

    pub fn played(&self) -> Vec<String> {
        self.with(|log| log.played.clone())
    }

    pub fn stops(&self) -> usize {
        self.with(|log| log.stops)
    }

    pub fn disconnects(&self) -> usize {
        self.with(|log| log.disconnects)
    }

    pub fn connects(&self) -> usize {
        self.with(|log| log.connects.len())
    }

    /// End signal of the most recently started stream.
    pub fn last_signal(&self) -> TrackEndSignal {
        self.with(|log| log.signals.last().cloned())
            .expect("nothing was played")
    }

    /// Let the most recent stream run to completion.
    pub async fn finish_current(&self) {
        let signal = self.last_signal();
        signal.deliver().await;
    }
}

fn describe(source: &AudioSource) -> String {
    match source {
        AudioSource::File(path) => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
        AudioSource::Stream(url) => url.to_string(),
    }
}

#[derive(Clone, Default)]
pub struct FakeGateway {
    pub log: SharedLog,
    /// Delay before a connection is confirmed.
    pub connect_delay: Option<Duration>,
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Box<dyn VoiceConnection>> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.log.with(|log| log.connects.push(channel_id));
        Ok(Box::new(FakeConnection {
            channel_id,
            log: self.log.clone(),
        }))
    }
}

pub struct FakeConnection {
    channel_id: ChannelId,
    log: SharedLog,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn move_to(&mut self, channel_id: ChannelId) -> MusicResult<()> {
        self.channel_id = channel_id;
        self.log.with(|log| log.moves.push(channel_id));
        Ok(())
    }

    async fn play(&mut self, source: &AudioSource, on_end: TrackEndSignal) -> MusicResult<()> {
        let name = describe(source);
        // Sources named "broken*" fail to start
        if name.starts_with("broken") {
            return Err(MusicError::PlaybackError("decoder error".to_string()));
        }
        self.log.with(|log| {
            log.played.push(name);
            log.signals.push(on_end);
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.log.with(|log| log.stops += 1);
    }

    async fn disconnect(&mut self) -> MusicResult<()> {
        self.log.with(|log| log.disconnects += 1);
        Ok(())
    }
}

/// Voice presence held in memory.
#[derive(Default)]
pub struct FakePresence {
    channels: Mutex<HashMap<UserId, ChannelId>>,
}

impl FakePresence {
    pub fn with_members(channel_id: ChannelId, members: &[UserId]) -> Self {
        let presence = Self::default();
        for member in members {
            presence.enter(*member, channel_id);
        }
        presence
    }

    pub fn enter(&self, member: UserId, channel_id: ChannelId) {
        self.channels.lock().unwrap().insert(member, channel_id);
    }

    pub fn leave(&self, member: UserId) {
        self.channels.lock().unwrap().remove(&member);
    }
}

impl Presence for FakePresence {
    fn current_voice_channel(&self, _guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.channels.lock().unwrap().get(&user_id).copied()
    }

    fn channel_members(&self, _guild_id: GuildId, channel_id: ChannelId) -> Vec<UserId> {
        let mut members: Vec<UserId> = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, channel)| **channel == channel_id)
            .map(|(member, _)| *member)
            .collect();
        members.sort();
        members
    }
}

/// Serves canned metadata and writes a small file for every download.
#[derive(Default)]
pub struct StubFetcher {
    media: Mutex<HashMap<String, MediaInfo>>,
    probes: AtomicUsize,
    downloads: AtomicUsize,
}

impl StubFetcher {
    pub fn with_media(self, url: &str, info: MediaInfo) -> Self {
        self.media.lock().unwrap().insert(url.to_string(), info);
        self
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn probe(&self, url: &str) -> MusicResult<MediaInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.media
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| MusicError::FetchFailed(format!("HTTP 404 for {}", url)))
    }

    async fn download(&self, _url: &str, dir: &Path, stem: &str) -> MusicResult<PathBuf> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let path = dir.join(format!("{}.webm", stem));
        tokio::fs::write(&path, b"audio")
            .await
            .map_err(|e| MusicError::FetchFailed(e.to_string()))?;
        Ok(path)
    }
}
