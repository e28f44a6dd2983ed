mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use jukebot::{
    AudioSource, MusicError, PlayOutcome, PlayRequest, PlayerState, QueueSummary, StopOutcome,
    VoteOutcome,
};
use jukebot::events::drop_guild_session;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

use common::Harness;
use common::fixtures::*;
use common::mocks::StubFetcher;

const SONG_A: &str = "https://www.youtube.com/watch?v=aaaaaaaaaaa";
const SONG_B: &str = "https://media.example.com/b";

fn remote(url: &str) -> PlayRequest {
    PlayRequest::RemoteUrl(url.to_string())
}

fn fetcher() -> StubFetcher {
    StubFetcher::default()
        .with_media(SONG_A, video("aaaaaaaaaaa", "Song A", 200))
        .with_media(SONG_B, video("b-01", "Song B", 300))
}

#[tokio::test]
async fn play_needs_a_voice_channel() {
    let harness = Harness::new(fetcher());

    let result = harness.jukebox.play(GUILD, user(9), remote(SONG_A)).await;

    assert_eq!(result, Err(MusicError::NoChannel));
    assert!(harness.jukebox.registry().is_empty());
    assert_eq!(harness.fetcher.probes(), 0);
}

#[tokio::test]
async fn remote_media_is_queued_and_never_fetched_twice() {
    let harness = Harness::new(fetcher());
    let jukebox = &harness.jukebox;

    assert_eq!(
        jukebox.play(GUILD, user(1), remote(SONG_A)).await,
        Ok(PlayOutcome::Started {
            name: "Song A".to_string()
        })
    );
    assert_eq!(
        jukebox.play(GUILD, user(2), remote(SONG_B)).await,
        Ok(PlayOutcome::Queued {
            name: "Song B".to_string(),
            position: 1
        })
    );
    assert_eq!(
        jukebox.play(GUILD, user(3), remote(SONG_A)).await,
        Err(MusicError::AlreadyDownloaded("Song A".to_string()))
    );
    assert_eq!(
        jukebox.play(GUILD, user(3), remote(SONG_B)).await,
        Err(MusicError::AlreadyDownloaded("Song B".to_string()))
    );

    // Repeats are caught before any network access
    assert_eq!(harness.fetcher.downloads(), 2);
    assert_eq!(harness.fetcher.probes(), 2);

    let guild_dir = harness.media.path().join(GUILD.to_string());
    assert!(guild_dir.join("aaaaaaaaaaa.webm").is_file());
    assert!(guild_dir.join("b01.webm").is_file());
    assert!(guild_dir.join("aaaaaaaaaaa.info.json").is_file());

    assert_eq!(
        jukebox.queue_summary(GUILD).await,
        QueueSummary {
            state: PlayerState::Locked,
            current: Some("Song A".to_string()),
            queued: vec!["Song B".to_string()],
        }
    );
}

#[tokio::test]
async fn finished_items_advance_the_queue() {
    let harness = Harness::new(fetcher());
    let jukebox = &harness.jukebox;

    jukebox.play(GUILD, user(1), remote(SONG_A)).await.unwrap();
    jukebox.play(GUILD, user(1), remote(SONG_B)).await.unwrap();

    harness.gateway.log.finish_current().await;
    let current = jukebox.current(GUILD).await.unwrap();
    assert_eq!(current.name(), "Song B");
    assert_eq!(current.origin_url().map(|url| url.as_str()), Some(SONG_B));

    harness.gateway.log.finish_current().await;
    assert!(jukebox.current(GUILD).await.is_none());
    assert_eq!(jukebox.queue_summary(GUILD).await.state, PlayerState::Idle);
    assert_eq!(harness.gateway.log.played(), vec!["aaaaaaaaaaa", "b01"]);
}

#[tokio::test]
async fn local_assets_play_directly_and_can_be_stopped() {
    let harness = Harness::new(StubFetcher::default());
    let guild_dir = harness.media.path().join(GUILD.to_string());
    std::fs::create_dir_all(&guild_dir).unwrap();
    std::fs::write(guild_dir.join("airhorn.mp3"), b"honk").unwrap();

    let request = PlayRequest::LocalAsset {
        name: "airhorn".to_string(),
        path: PathBuf::from("airhorn.mp3"),
    };
    assert_eq!(
        harness.jukebox.play(GUILD, user(2), request).await,
        Ok(PlayOutcome::Started {
            name: "airhorn".to_string()
        })
    );

    let current = harness.jukebox.current(GUILD).await.unwrap();
    assert!(!current.is_queued());
    assert_eq!(
        current.source(),
        &AudioSource::File(guild_dir.join("airhorn.mp3"))
    );

    assert_eq!(harness.jukebox.stop(GUILD).await, StopOutcome::Stopped);
    assert_eq!(harness.jukebox.stop(GUILD).await, StopOutcome::Ignored);
}

#[tokio::test]
async fn failed_fetch_leaves_no_session_behind() {
    let harness = Harness::new(StubFetcher::default());

    let result = harness
        .jukebox
        .play(GUILD, user(1), remote("https://media.example.com/gone"))
        .await;

    assert_matches!(result, Err(MusicError::FetchFailed(_)));
    assert!(harness.jukebox.registry().is_empty());
    assert_eq!(harness.gateway.log.connects(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_session() {
    let urls: Vec<String> = (0..8)
        .map(|i| format!("https://media.example.com/track{}", i))
        .collect();
    let fetcher = urls.iter().enumerate().fold(StubFetcher::default(), |f, (i, url)| {
        f.with_media(url, video(&format!("track{}", i), &format!("Track {}", i), 60))
    });
    let harness = Harness::new(fetcher);

    let handles: Vec<_> = urls
        .iter()
        .map(|url| {
            let jukebox = harness.jukebox.clone();
            let request = remote(url);
            tokio::spawn(async move { jukebox.play(GUILD, user(1), request).await })
        })
        .collect();

    let mut started = 0;
    let mut positions = Vec::new();
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            PlayOutcome::Started { .. } => started += 1,
            PlayOutcome::Queued { position, .. } => positions.push(position),
            PlayOutcome::Ignored { .. } => panic!("queued items are never ignored"),
        }
    }
    positions.sort();

    assert_eq!(started, 1);
    assert_eq!(positions, (1..=7).collect::<Vec<_>>());
    assert_eq!(harness.jukebox.registry().len(), 1);
    assert_eq!(harness.gateway.log.connects(), 1);
}

#[tokio::test]
async fn operations_on_unknown_server() {
    let harness = Harness::new(StubFetcher::default());
    let jukebox = &harness.jukebox;

    assert_eq!(
        jukebox.skip(GUILD, user(1), true).await,
        Err(MusicError::NothingPlaying)
    );
    assert_eq!(
        jukebox.clear(GUILD, user(1), true).await,
        Err(MusicError::NothingPlaying)
    );
    assert_eq!(jukebox.stop(GUILD).await, StopOutcome::Ignored);
    assert_eq!(jukebox.queue_summary(GUILD).await, QueueSummary::default());
    assert!(jukebox.current(GUILD).await.is_none());
    assert_eq!(jukebox.leave(GUILD).await, Err(MusicError::NotConnected));
    assert!(jukebox.registry().is_empty());
}

#[tokio::test]
async fn join_and_leave() {
    let harness = Harness::new(StubFetcher::default());
    let jukebox = &harness.jukebox;

    assert_eq!(
        jukebox.join_channel(GUILD, user(9)).await,
        Err(MusicError::NoChannel)
    );
    assert_eq!(jukebox.join_channel(GUILD, user(1)).await, Ok(CHANNEL));
    // Without a channel of their own the caller keeps the bot where it is
    assert_eq!(jukebox.join_channel(GUILD, user(9)).await, Ok(CHANNEL));

    harness.presence.enter(user(2), OTHER_CHANNEL);
    assert_eq!(jukebox.join_channel(GUILD, user(2)).await, Ok(OTHER_CHANNEL));

    assert_eq!(jukebox.leave(GUILD).await, Ok(()));
    assert_eq!(harness.gateway.log.disconnects(), 1);
    assert!(jukebox.registry().is_empty());
    assert_eq!(jukebox.leave(GUILD).await, Err(MusicError::NotConnected));
}

#[tokio::test]
async fn queued_playback_is_not_moved_between_channels() {
    let harness = Harness::new(fetcher());
    let jukebox = &harness.jukebox;

    jukebox.play(GUILD, user(1), remote(SONG_A)).await.unwrap();

    harness.presence.enter(user(2), OTHER_CHANNEL);
    assert_eq!(
        jukebox.play(GUILD, user(2), remote(SONG_B)).await,
        Ok(PlayOutcome::Queued {
            name: "Song B".to_string(),
            position: 1
        })
    );
    assert!(harness.gateway.log.with(|log| log.moves.is_empty()));
}

#[tokio::test]
async fn voice_state_changes_rebuild_ballots() {
    let harness = Harness::new(fetcher());
    let jukebox = &harness.jukebox;

    jukebox.play(GUILD, user(1), remote(SONG_A)).await.unwrap();

    harness.presence.leave(user(3));
    jukebox.refresh_members(GUILD).await;

    assert_eq!(
        jukebox.skip(GUILD, user(3), false).await,
        Err(MusicError::NotInChannel)
    );
}

#[tokio::test]
async fn unrelated_voice_updates_keep_cast_ballots() {
    let harness = Harness::new(fetcher());
    let jukebox = &harness.jukebox;

    jukebox.play(GUILD, user(1), remote(SONG_A)).await.unwrap();
    assert_eq!(
        jukebox.skip(GUILD, user(2), false).await,
        Ok(VoteOutcome::Recorded {
            count: 1,
            threshold: 2
        })
    );

    // Someone mutes or moves elsewhere; the bot's channel is unchanged
    harness.presence.enter(user(8), OTHER_CHANNEL);
    jukebox.refresh_members(GUILD).await;

    assert_eq!(
        jukebox.skip(GUILD, user(3), false).await,
        Ok(VoteOutcome::Skipped)
    );
}

#[tokio::test]
async fn waiting_item_reports_when_it_started() {
    let harness = Harness::new(fetcher());
    let jukebox = &harness.jukebox;

    jukebox.play(GUILD, user(1), remote(SONG_A)).await.unwrap();
    jukebox.play(GUILD, user(2), remote(SONG_B)).await.unwrap();
    assert!(jukebox.current(GUILD).await.unwrap().started_at().is_some());

    let before_start = Utc::now();
    harness.gateway.log.finish_current().await;

    let current = jukebox.current(GUILD).await.unwrap();
    assert_eq!(current.name(), "Song B");
    assert!(current.requested_at() <= before_start);
    assert!(current.started_at().is_some_and(|started| started >= before_start));
}

#[tokio::test]
async fn removed_guild_loses_its_session_once() {
    let harness = Harness::new(StubFetcher::default());
    harness.jukebox.join_channel(GUILD, user(1)).await.unwrap();

    drop_guild_session(&harness.jukebox, GUILD).await;
    drop_guild_session(&harness.jukebox, GUILD).await;

    assert!(harness.jukebox.registry().is_empty());
    assert_eq!(harness.gateway.log.disconnects(), 1);
}
