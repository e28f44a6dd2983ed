//! Periodic eviction of idle sessions.
//!
//! A session that is idle on one tick is marked stale. If it is still stale
//! on the next tick it is disconnected and dropped from the registry. Any
//! play or join in between revives it.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::playback_session::ReapAction;
use super::session_registry::SessionRegistry;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub marked_stale: usize,
    pub evicted: usize,
}

/// Run one sweep over every session in `registry`.
pub async fn reap_idle_sessions(registry: &SessionRegistry) -> ReapReport {
    let sweeps = registry
        .snapshot()
        .into_iter()
        .map(|(guild_id, session)| async move {
            let action = session.lock().await.reap_tick().await;
            if action == ReapAction::Evicted {
                registry.remove_if_same(guild_id, &session);
            }
            action
        });

    let mut report = ReapReport::default();
    for action in join_all(sweeps).await {
        match action {
            ReapAction::MarkedStale => report.marked_stale += 1,
            ReapAction::Evicted => report.evicted += 1,
            ReapAction::Active => {}
        }
    }

    if report.evicted > 0 {
        info!("Evicted {} idle sessions", report.evicted);
    }
    report
}

/// Sweep `registry` every `period` until the task is aborted.
pub fn spawn_idle_reaper(registry: Arc<SessionRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let report = reap_idle_sessions(&registry).await;
            debug!(
                "Reaper tick: {} marked stale, {} evicted, {} remaining",
                report.marked_stale,
                report.evicted,
                registry.len()
            );
        }
    })
}
