//! Sample ids, items and media used across the integration tests.

use jukebot::{AudioItem, AudioSource, MediaInfo, PlaybackSession, SharedSession};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::mocks::{FakeGateway, FakePresence};

pub const GUILD: GuildId = GuildId::new(42);
pub const CHANNEL: ChannelId = ChannelId::new(500);
pub const OTHER_CHANNEL: ChannelId = ChannelId::new(501);
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn user(id: u64) -> UserId {
    UserId::new(id)
}

pub fn users(ids: &[u64]) -> Vec<UserId> {
    ids.iter().map(|id| UserId::new(*id)).collect()
}

/// A queued item whose file stem is `name`.
pub fn queued(name: &str, requester: u64) -> AudioItem {
    AudioItem::queued(
        name,
        AudioSource::File(PathBuf::from(format!("{}.webm", name))),
        None,
        user(requester),
    )
}

/// A direct item whose file stem is `name`.
pub fn direct(name: &str, requester: u64) -> AudioItem {
    AudioItem::direct(name, format!("{}.mp3", name), user(requester))
}

pub fn video(id: &str, title: &str, secs: u64) -> MediaInfo {
    MediaInfo {
        id: id.to_string(),
        title: title.to_string(),
        duration: Some(Duration::from_secs(secs)),
        is_live: false,
        is_playlist: false,
    }
}

/// A session already connected to `CHANNEL`.
pub async fn connected_session(
    presence: Arc<FakePresence>,
    gateway: &FakeGateway,
) -> SharedSession {
    let session = PlaybackSession::new_shared(GUILD, presence, 3);
    session
        .lock()
        .await
        .join_channel(gateway, Some(CHANNEL), JOIN_TIMEOUT)
        .await
        .expect("fake gateway always connects");
    session
}
