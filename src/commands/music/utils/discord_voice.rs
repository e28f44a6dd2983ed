//! songbird and serenity-cache implementations of the voice seams.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::cache::Cache;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::Mutex as SerenityMutex;
use songbird::input::{File, Input, YoutubeDl};
use songbird::tracks::TrackHandle;
use songbird::{Call, Event, Songbird, TrackEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::event_handlers::{TrackEndNotifier, TrackEndSignal};
use super::music_manager::{MusicError, MusicResult};
use super::voice::{Presence, VoiceConnection, VoiceGateway};
use crate::commands::music::audio_sources::AudioSource;

/// Opens voice connections through songbird.
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { songbird, http }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Box<dyn VoiceConnection>> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;

        info!("Joined voice channel {} in guild {}", channel_id, guild_id);
        Ok(Box::new(SongbirdConnection {
            songbird: self.songbird.clone(),
            http: self.http.clone(),
            guild_id,
            channel_id,
            call,
            track: None,
        }))
    }
}

/// One songbird call, owned by a playback session.
pub struct SongbirdConnection {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<SerenityMutex<Call>>,
    track: Option<TrackHandle>,
}

impl SongbirdConnection {
    fn input_for(&self, source: &AudioSource) -> Input {
        match source {
            AudioSource::File(path) => File::new(path.clone()).into(),
            AudioSource::Stream(url) => YoutubeDl::new(self.http.clone(), url.to_string()).into(),
        }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn move_to(&mut self, channel_id: ChannelId) -> MusicResult<()> {
        self.call = self
            .songbird
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;
        self.channel_id = channel_id;
        Ok(())
    }

    async fn play(&mut self, source: &AudioSource, on_end: TrackEndSignal) -> MusicResult<()> {
        self.stop();

        let input = self.input_for(source);
        let track = self.call.lock().await.play_input(input);

        // Errored tracks never reach End, so both events report completion
        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        signal: on_end.clone(),
                    },
                )
                .map_err(|e| MusicError::PlaybackError(e.to_string()))?;
        }

        self.track = Some(track);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(track) = self.track.take() {
            if let Err(e) = track.stop() {
                debug!("Track in guild {} already gone: {}", self.guild_id, e);
            }
        }
    }

    async fn disconnect(&mut self) -> MusicResult<()> {
        self.stop();
        self.songbird
            .remove(self.guild_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;
        info!("Disconnected from voice in guild {}", self.guild_id);
        Ok(())
    }
}

/// Presence lookups backed by the serenity cache.
pub struct CachePresence {
    cache: Arc<Cache>,
}

impl CachePresence {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

impl Presence for CachePresence {
    fn current_voice_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        let guild = self.cache.guild(guild_id)?;
        guild
            .voice_states
            .get(&user_id)
            .and_then(|state| state.channel_id)
    }

    fn channel_members(&self, guild_id: GuildId, channel_id: ChannelId) -> Vec<UserId> {
        let current_user = self.cache.current_user().id;
        let Some(guild) = self.cache.guild(guild_id) else {
            warn!("Guild {} is not cached, assuming an empty channel", guild_id);
            return Vec::new();
        };

        guild
            .voice_states
            .iter()
            .filter(|(_, state)| state.channel_id == Some(channel_id))
            .filter(|(user_id, state)| {
                let is_bot = state
                    .member
                    .as_ref()
                    .map(|member| member.user.bot)
                    .or_else(|| guild.members.get(user_id).map(|member| member.user.bot))
                    .unwrap_or(false);
                **user_id != current_user && !is_bot
            })
            .map(|(user_id, _)| *user_id)
            .collect()
    }
}
