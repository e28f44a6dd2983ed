//! Seams between the playback core and the voice platform.
//!
//! The core never talks to songbird or the serenity cache directly; it goes
//! through these traits. The production implementations live in
//! [`super::discord_voice`].

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};

use super::event_handlers::TrackEndSignal;
use super::music_manager::MusicResult;
use crate::commands::music::audio_sources::AudioSource;

/// Establishes voice connections.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Connect to `channel_id`. Suspends until the transport confirms.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Box<dyn VoiceConnection>>;
}

/// A live voice connection, exclusively owned by one playback session.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// The channel the connection is currently in.
    fn channel_id(&self) -> ChannelId;

    /// Move the connection to another channel of the same server.
    async fn move_to(&mut self, channel_id: ChannelId) -> MusicResult<()>;

    /// Start streaming `source`, replacing whatever was playing.
    ///
    /// `on_end` must be delivered from whatever context the audio engine
    /// uses once the stream finishes or is stopped.
    async fn play(&mut self, source: &AudioSource, on_end: TrackEndSignal) -> MusicResult<()>;

    /// Halt the active stream, if any.
    fn stop(&mut self);

    async fn disconnect(&mut self) -> MusicResult<()>;
}

/// Voice presence lookups.
pub trait Presence: Send + Sync {
    /// The voice channel `user_id` is in, if any.
    fn current_voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;

    /// Human members currently in `channel_id`.
    fn channel_members(&self, guild_id: GuildId, channel_id: ChannelId) -> Vec<UserId>;
}
