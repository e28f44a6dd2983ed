use serenity::model::id::{ChannelId, GuildId, UserId};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::idle_reaper::{self, ReapReport};
use super::playback_session::{
    PlayOutcome, PlaybackSession, PlayerState, QueueSummary, StopOutcome, VoteOutcome,
};
use super::session_registry::SessionRegistry;
use super::voice::{Presence, VoiceGateway};
use crate::commands::music::audio_sources::{AudioItem, AudioResolver, MediaFetcher, PlayRequest};
use crate::config::PlayerConfig;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Media rejected: {0}")]
    MediaRejected(String),

    #[error("Already downloaded as '{0}'")]
    AlreadyDownloaded(String),

    #[error("Failed to fetch media: {0}")]
    FetchFailed(String),

    #[error("You are not in the voice channel")]
    NotInChannel,

    #[error("You need to be in a voice channel")]
    NoChannel,

    #[error("Not in a guild")]
    NotInGuild,

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Nothing is playing")]
    NothingPlaying,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Timed out while {0}")]
    Timeout(&'static str),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Entry point for everything the command layer does with voice playback.
///
/// Owns the session registry and the resolver. Remote media is resolved
/// before the session lock is taken, so a slow download never blocks other
/// requests for the same server.
pub struct Jukebox {
    registry: Arc<SessionRegistry>,
    resolver: AudioResolver,
    gateway: Arc<dyn VoiceGateway>,
    presence: Arc<dyn Presence>,
    config: PlayerConfig,
}

impl Jukebox {
    pub fn new(
        config: PlayerConfig,
        media_root: impl Into<PathBuf>,
        gateway: Arc<dyn VoiceGateway>,
        presence: Arc<dyn Presence>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            presence.clone(),
            config.vote_threshold,
        ));
        let resolver = AudioResolver::new(fetcher, media_root, &config);

        Self {
            registry,
            resolver,
            gateway,
            presence,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &AudioResolver {
        &self.resolver
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Resolve `request` and hand it to the server's session, joining the
    /// requester's voice channel first when nothing queued is playing.
    pub async fn play(
        &self,
        guild_id: GuildId,
        requester: UserId,
        request: PlayRequest,
    ) -> MusicResult<PlayOutcome> {
        let channel = self.presence.current_voice_channel(guild_id, requester);
        if channel.is_none() && !self.is_connected(guild_id).await {
            return Err(MusicError::NoChannel);
        }

        let item = self.resolver.resolve(guild_id, requester, request).await?;

        let mut session = self.lock_session(guild_id).await;
        session.revive();

        // A queued stream keeps the connection where it is
        if session.state() != PlayerState::Locked {
            session
                .join_channel(self.gateway.as_ref(), channel, self.config.join_timeout)
                .await?;
        }

        let outcome = session.play(item).await?;
        debug!("Play in guild {}: {:?}", guild_id, outcome);
        Ok(outcome)
    }

    pub async fn skip(
        &self,
        guild_id: GuildId,
        member: UserId,
        is_moderator: bool,
    ) -> MusicResult<VoteOutcome> {
        let mut session = self
            .existing_session(guild_id)
            .await
            .ok_or(MusicError::NothingPlaying)?;
        session.skip(member, is_moderator).await
    }

    pub async fn clear(
        &self,
        guild_id: GuildId,
        member: UserId,
        is_moderator: bool,
    ) -> MusicResult<VoteOutcome> {
        let mut session = self
            .existing_session(guild_id)
            .await
            .ok_or(MusicError::NothingPlaying)?;
        session.clear(member, is_moderator).await
    }

    pub async fn stop(&self, guild_id: GuildId) -> StopOutcome {
        match self.existing_session(guild_id).await {
            Some(mut session) => session.stop(),
            None => StopOutcome::Ignored,
        }
    }

    pub async fn queue_summary(&self, guild_id: GuildId) -> QueueSummary {
        match self.existing_session(guild_id).await {
            Some(session) => session.summary(),
            None => QueueSummary::default(),
        }
    }

    /// The item currently streaming, if any.
    pub async fn current(&self, guild_id: GuildId) -> Option<AudioItem> {
        let session = self.existing_session(guild_id).await?;
        session.current().cloned()
    }

    /// Join `member`'s voice channel, or move there.
    pub async fn join_channel(&self, guild_id: GuildId, member: UserId) -> MusicResult<ChannelId> {
        let channel = self.presence.current_voice_channel(guild_id, member);
        if channel.is_none() && !self.is_connected(guild_id).await {
            return Err(MusicError::NoChannel);
        }

        let mut session = self.lock_session(guild_id).await;
        session.revive();
        session
            .join_channel(self.gateway.as_ref(), channel, self.config.join_timeout)
            .await
    }

    /// Disconnect and drop the server's session.
    pub async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        let session = self
            .registry
            .remove(guild_id)
            .ok_or(MusicError::NotConnected)?;

        let mut session = session.lock().await;
        let was_connected = session.is_connected();
        session.teardown().await;
        info!("Left voice in guild {}", guild_id);

        if was_connected {
            Ok(())
        } else {
            Err(MusicError::NotConnected)
        }
    }

    /// Rebuild the ballots after a voice state change.
    pub async fn refresh_members(&self, guild_id: GuildId) {
        if let Some(mut session) = self.existing_session(guild_id).await {
            session.refresh_votes();
        }
    }

    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        info!(
            "Starting idle reaper with a period of {:?}",
            self.config.reaper_interval
        );
        idle_reaper::spawn_idle_reaper(self.registry.clone(), self.config.reaper_interval)
    }

    /// Run a single reaper sweep now.
    pub async fn reap_once(&self) -> ReapReport {
        idle_reaper::reap_idle_sessions(&self.registry).await
    }

    async fn is_connected(&self, guild_id: GuildId) -> bool {
        match self.existing_session(guild_id).await {
            Some(session) => session.is_connected(),
            None => false,
        }
    }

    /// Lock the server's session, creating it if needed. A session evicted
    /// while we waited for its lock is discarded and replaced.
    async fn lock_session(&self, guild_id: GuildId) -> OwnedMutexGuard<PlaybackSession> {
        loop {
            let session = self.registry.get_or_create(guild_id);
            let guard = session.clone().lock_owned().await;
            if !guard.is_evicted() {
                return guard;
            }

            debug!("Session for guild {} was evicted, retrying", guild_id);
            drop(guard);
            self.registry.remove_if_same(guild_id, &session);
        }
    }

    /// Lock the server's session without creating one.
    async fn existing_session(&self, guild_id: GuildId) -> Option<OwnedMutexGuard<PlaybackSession>> {
        let session = self.registry.get(guild_id)?;
        let guard = session.lock_owned().await;
        (!guard.is_evicted()).then_some(guard)
    }
}
