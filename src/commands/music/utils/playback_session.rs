//! The per-server playback session.
//!
//! A session owns the server's voice connection, its FIFO queue of queued
//! items, the item currently streaming and the skip/clear ballots. All of
//! it sits behind one `tokio::sync::Mutex` ([`SharedSession`]); commands,
//! track-end signals and the idle reaper all go through that lock.
//!
//! States:
//!
//! * `Idle`: nothing streaming.
//! * `Playing`: a direct item is streaming. Anything may interrupt it.
//! * `Locked`: a queued item is streaming. Direct requests are ignored,
//!   new queued items wait in line, interruption goes through a vote.
//! * `Stale`: marked by the reaper after one idle tick, evicted on the next.

use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::event_handlers::TrackEndSignal;
use super::music_manager::{MusicError, MusicResult};
use super::voice::{Presence, VoiceConnection, VoiceGateway};
use super::votes::{self, Ballots, VoteBox};
use crate::commands::music::audio_sources::AudioItem;

pub type SharedSession = Arc<Mutex<PlaybackSession>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
    Locked,
    Stale,
}

/// Result of a play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The item is streaming now.
    Started { name: String },
    /// The item waits at `position` (1-based) in the queue.
    Queued { name: String, position: usize },
    /// A direct item arrived while queued playback was active.
    Ignored { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    Ignored,
}

/// Result of a skip or clear request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Skipped,
    Cleared,
    /// The ballot counted but the vote is still open.
    Recorded { count: usize, threshold: usize },
}

/// What the reaper did to a session on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapAction {
    Active,
    MarkedStale,
    Evicted,
}

/// Snapshot of a session for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub state: PlayerState,
    pub current: Option<String>,
    pub queued: Vec<String>,
}

pub struct PlaybackSession {
    guild_id: GuildId,
    state: PlayerState,
    queue: VecDeque<AudioItem>,
    current: Option<AudioItem>,
    connection: Option<Box<dyn VoiceConnection>>,
    ballots: Ballots,
    presence: Arc<dyn Presence>,
    vote_threshold: usize,
    // Bumped whenever a stream starts or is halted; end signals carrying an
    // older id belong to a stream that was already replaced.
    playback_id: u64,
    evicted: bool,
    self_ref: Weak<Mutex<PlaybackSession>>,
}

impl PlaybackSession {
    /// Create a session wrapped in its lock.
    pub fn new_shared(
        guild_id: GuildId,
        presence: Arc<dyn Presence>,
        vote_threshold: usize,
    ) -> SharedSession {
        Arc::new_cyclic(|self_ref| {
            Mutex::new(Self {
                guild_id,
                state: PlayerState::Idle,
                queue: VecDeque::new(),
                current: None,
                connection: None,
                ballots: Ballots::default(),
                presence,
                vote_threshold,
                playback_id: 0,
                evicted: false,
                self_ref: self_ref.clone(),
            })
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current(&self) -> Option<&AudioItem> {
        self.current.as_ref()
    }

    pub fn queued(&self) -> impl Iterator<Item = &AudioItem> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.connection.as_ref().map(|c| c.channel_id())
    }

    pub fn skip_votes(&self) -> &VoteBox {
        &self.ballots.skip
    }

    pub fn clear_votes(&self) -> &VoteBox {
        &self.ballots.clear
    }

    /// True once the reaper or an explicit leave has torn the session down.
    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    pub fn summary(&self) -> QueueSummary {
        QueueSummary {
            state: self.state,
            current: self.current.as_ref().map(|item| item.name().to_string()),
            queued: self.queue.iter().map(|item| item.name().to_string()).collect(),
        }
    }

    /// Pull a stale session back to idle because someone is using it again.
    pub fn revive(&mut self) {
        if self.state == PlayerState::Stale && !self.evicted {
            info!("Reviving stale session for guild {}", self.guild_id);
            self.state = PlayerState::Idle;
        }
    }

    /// Connect to `channel`, or move the existing connection there.
    ///
    /// Without a channel the existing connection is kept; without either the
    /// request fails with [`MusicError::NoChannel`].
    pub async fn join_channel(
        &mut self,
        gateway: &dyn VoiceGateway,
        channel: Option<ChannelId>,
        timeout: Duration,
    ) -> MusicResult<ChannelId> {
        let Some(channel_id) = channel else {
            return self.channel_id().ok_or(MusicError::NoChannel);
        };

        match self.connection.as_mut() {
            Some(connection) if connection.channel_id() == channel_id => return Ok(channel_id),
            Some(connection) => {
                info!(
                    "Moving voice connection in guild {} to channel {}",
                    self.guild_id, channel_id
                );
                tokio::time::timeout(timeout, connection.move_to(channel_id))
                    .await
                    .map_err(|_| MusicError::Timeout("moving to the voice channel"))??;
            }
            None => {
                info!(
                    "Joining voice channel {} in guild {}",
                    channel_id, self.guild_id
                );
                let connection =
                    tokio::time::timeout(timeout, gateway.connect(self.guild_id, channel_id))
                        .await
                        .map_err(|_| MusicError::Timeout("joining the voice channel"))??;
                self.connection = Some(connection);
            }
        }

        self.refresh_votes();
        Ok(channel_id)
    }

    /// Play `item` according to the current state.
    pub async fn play(&mut self, item: AudioItem) -> MusicResult<PlayOutcome> {
        if self.connection.is_none() {
            return Err(MusicError::NotConnected);
        }

        let name = item.name().to_string();

        if self.state == PlayerState::Locked {
            if item.is_queued() {
                self.queue.push_back(item);
                debug!(
                    "Queued '{}' at position {} in guild {}",
                    name,
                    self.queue.len(),
                    self.guild_id
                );
                return Ok(PlayOutcome::Queued {
                    name,
                    position: self.queue.len(),
                });
            }

            debug!(
                "Ignoring direct item '{}' during queued playback in guild {}",
                name, self.guild_id
            );
            return Ok(PlayOutcome::Ignored { name });
        }

        self.start(item).await?;
        Ok(PlayOutcome::Started { name })
    }

    /// Halt a direct item. Queued playback can only be interrupted by a vote.
    pub fn stop(&mut self) -> StopOutcome {
        if self.state != PlayerState::Playing {
            return StopOutcome::Ignored;
        }

        info!("Stopping playback in guild {}", self.guild_id);
        self.halt_stream();
        self.go_idle();
        StopOutcome::Stopped
    }

    /// Skip the current item, by vote when queued playback is active.
    pub async fn skip(&mut self, member: UserId, is_moderator: bool) -> MusicResult<VoteOutcome> {
        match self.state {
            PlayerState::Playing => {
                self.stop();
                Ok(VoteOutcome::Skipped)
            }
            PlayerState::Locked => {
                let tally = self.ballots.skip.cast(member, self.vote_threshold)?;
                if !votes::resolves(&tally, self.is_requester(member), is_moderator) {
                    return Ok(VoteOutcome::Recorded {
                        count: tally.count,
                        threshold: tally.threshold,
                    });
                }

                info!(
                    "Skip vote resolved in guild {} ({}/{})",
                    self.guild_id, tally.count, tally.threshold
                );
                self.ballots.clear();
                self.halt_stream();
                self.advance().await;
                Ok(VoteOutcome::Skipped)
            }
            PlayerState::Idle | PlayerState::Stale => Err(MusicError::NothingPlaying),
        }
    }

    /// Drop the queue and halt the current item, by vote when queued
    /// playback is active.
    pub async fn clear(&mut self, member: UserId, is_moderator: bool) -> MusicResult<VoteOutcome> {
        match self.state {
            PlayerState::Playing => {
                self.queue.clear();
                self.stop();
                Ok(VoteOutcome::Cleared)
            }
            PlayerState::Locked => {
                let tally = self.ballots.clear.cast(member, self.vote_threshold)?;
                if !votes::resolves(&tally, self.is_requester(member), is_moderator) {
                    return Ok(VoteOutcome::Recorded {
                        count: tally.count,
                        threshold: tally.threshold,
                    });
                }

                info!(
                    "Clear vote resolved in guild {}, dropping {} queued items",
                    self.guild_id,
                    self.queue.len()
                );
                self.queue.clear();
                self.halt_stream();
                self.go_idle();
                Ok(VoteOutcome::Cleared)
            }
            PlayerState::Idle | PlayerState::Stale => Err(MusicError::NothingPlaying),
        }
    }

    /// Rebuild both ballot boxes if the channel's members changed since the
    /// last rebuild. Ballots already cast survive unrelated voice updates.
    pub fn refresh_votes(&mut self) {
        match (&self.current, &self.connection) {
            (Some(_), Some(connection)) => {
                let members = self
                    .presence
                    .channel_members(self.guild_id, connection.channel_id());
                if self.ballots.sync(&members) {
                    debug!(
                        "Rebuilt ballots for {} members in guild {}",
                        members.len(),
                        self.guild_id
                    );
                }
            }
            _ => self.ballots.clear(),
        }
    }

    /// Completion of the stream identified by `playback_id`.
    pub async fn on_track_end(&mut self, playback_id: u64) {
        if playback_id != self.playback_id {
            debug!(
                "Ignoring end of superseded track {} in guild {}",
                playback_id, self.guild_id
            );
            return;
        }
        // Only the first signal for a stream counts
        self.playback_id += 1;

        let Some(finished) = self.current.take() else {
            debug_assert!(false, "track end with no current item");
            warn!(
                "Track {} ended in guild {} with nothing playing, resetting",
                playback_id, self.guild_id
            );
            self.go_idle();
            return;
        };

        info!("Finished '{}' in guild {}", finished.name(), self.guild_id);

        if finished.is_queued() {
            self.advance().await;
        } else {
            self.go_idle();
        }
    }

    /// One reaper tick: idle sessions go stale, stale sessions are torn down.
    pub async fn reap_tick(&mut self) -> ReapAction {
        match self.state {
            PlayerState::Playing | PlayerState::Locked => ReapAction::Active,
            PlayerState::Idle => {
                debug!("Marking session for guild {} as stale", self.guild_id);
                self.state = PlayerState::Stale;
                ReapAction::MarkedStale
            }
            PlayerState::Stale => {
                info!("Evicting idle session for guild {}", self.guild_id);
                self.teardown().await;
                ReapAction::Evicted
            }
        }
    }

    /// Halt everything and disconnect. The session is unusable afterwards.
    pub async fn teardown(&mut self) {
        self.halt_stream();
        self.queue.clear();
        self.ballots.clear();
        self.evicted = true;

        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.disconnect().await {
                warn!(
                    "Failed to disconnect voice in guild {}: {}",
                    self.guild_id, e
                );
            }
        }
    }

    fn is_requester(&self, member: UserId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|item| item.requester() == member)
    }

    /// Replace whatever is streaming with `item`.
    async fn start(&mut self, mut item: AudioItem) -> MusicResult<()> {
        self.halt_stream();

        let Some(connection) = self.connection.as_mut() else {
            self.go_idle();
            return Err(MusicError::NotConnected);
        };

        self.playback_id += 1;
        let signal = TrackEndSignal::new(self.self_ref.clone(), self.playback_id);

        if let Err(e) = connection.play(item.source(), signal).await {
            warn!(
                "Failed to start '{}' in guild {}: {}",
                item.name(),
                self.guild_id,
                e
            );
            self.go_idle();
            return Err(e);
        }

        info!("Now playing '{}' in guild {}", item.name(), self.guild_id);
        self.state = if item.is_queued() {
            PlayerState::Locked
        } else {
            PlayerState::Playing
        };
        item.mark_started();
        self.current = Some(item);
        // A new item always opens fresh ballots
        self.ballots.clear();
        self.refresh_votes();
        Ok(())
    }

    /// Start the next queued item that can be started, or go idle.
    async fn advance(&mut self) {
        while let Some(next) = self.queue.pop_front() {
            if self.start(next).await.is_ok() {
                return;
            }
        }

        debug!("Queue exhausted in guild {}", self.guild_id);
        self.go_idle();
    }

    fn halt_stream(&mut self) {
        if self.current.take().is_some() {
            if let Some(connection) = self.connection.as_mut() {
                connection.stop();
            }
        }
        self.playback_id += 1;
    }

    fn go_idle(&mut self) {
        self.current = None;
        self.state = PlayerState::Idle;
        self.ballots.clear();
    }
}
