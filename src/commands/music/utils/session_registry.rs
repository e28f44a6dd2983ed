use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::debug;

use super::playback_session::{PlaybackSession, SharedSession};
use super::voice::Presence;

/// Map of server id to its playback session.
///
/// At most one session exists per server. Creation and eviction go through
/// the map's shard locks, so two callers racing on an unknown server always
/// end up with the same session.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SharedSession>,
    presence: Arc<dyn Presence>,
    vote_threshold: usize,
}

impl SessionRegistry {
    pub fn new(presence: Arc<dyn Presence>, vote_threshold: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            presence,
            vote_threshold,
        }
    }

    /// The session for `guild_id`, created on first use.
    pub fn get_or_create(&self, guild_id: GuildId) -> SharedSession {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creating playback session for guild {}", guild_id);
                PlaybackSession::new_shared(guild_id, self.presence.clone(), self.vote_threshold)
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.remove(&guild_id).map(|(_, session)| session)
    }

    /// Remove the entry for `guild_id` only if it still holds `session`.
    ///
    /// Returns false when the entry was already replaced or removed.
    pub fn remove_if_same(&self, guild_id: GuildId, session: &SharedSession) -> bool {
        self.sessions
            .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    /// Every live session. The map is not locked while the caller works
    /// through the result.
    pub fn snapshot(&self) -> Vec<(GuildId, SharedSession)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
