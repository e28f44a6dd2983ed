use std::sync::Weak;

use serenity::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::playback_session::PlaybackSession;

/// Hands the end of a stream back to the session that started it.
///
/// The audio engine signals completion on its own task. Delivery queues up
/// on the session's lock like any external request, so a completion can
/// never interleave with a concurrent play or stop for the same server.
#[derive(Clone, Debug)]
pub struct TrackEndSignal {
    session: Weak<Mutex<PlaybackSession>>,
    playback_id: u64,
}

impl TrackEndSignal {
    pub(crate) fn new(session: Weak<Mutex<PlaybackSession>>, playback_id: u64) -> Self {
        Self {
            session,
            playback_id,
        }
    }

    /// The stream this signal belongs to.
    pub fn playback_id(&self) -> u64 {
        self.playback_id
    }

    /// Apply the end of the stream and return once the session has finished
    /// updating, including starting the next queued item.
    pub async fn deliver(&self) {
        match self.session.upgrade() {
            Some(session) => session.lock().await.on_track_end(self.playback_id).await,
            None => debug!(
                "Session dropped before track {} finished, ignoring",
                self.playback_id
            ),
        }
    }
}

/// Event handler for when a track ends
pub struct TrackEndNotifier {
    pub signal: TrackEndSignal,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        if let songbird::EventContext::Track(_) = ctx {
            debug!("Track {} ended", self.signal.playback_id());
            // Holds songbird's event task until the session is done
            self.signal.deliver().await;
        }
        None
    }
}
