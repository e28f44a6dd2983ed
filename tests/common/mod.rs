//! Common test utilities, fixtures, and fakes shared by the integration tests.
#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use jukebot::{Jukebox, PlayerConfig};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tracing::Level;

use fixtures::{CHANNEL, users};
use mocks::{FakeGateway, FakePresence, StubFetcher};

static INIT: Once = Once::new();

/// Route crate logs through the test writer, once per test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A jukebox wired to fakes, with members 1, 2 and 3 in `CHANNEL`.
pub struct Harness {
    pub jukebox: Arc<Jukebox>,
    pub gateway: FakeGateway,
    pub presence: Arc<FakePresence>,
    pub fetcher: Arc<StubFetcher>,
    pub media: TempDir,
}

impl Harness {
    pub fn new(fetcher: StubFetcher) -> Self {
        Self::with_config(fetcher, PlayerConfig::default())
    }

    pub fn with_config(fetcher: StubFetcher, config: PlayerConfig) -> Self {
        init_tracing();
        let media = tempfile::tempdir().expect("Failed to create media dir");
        let gateway = FakeGateway::default();
        let presence = Arc::new(FakePresence::with_members(CHANNEL, &users(&[1, 2, 3])));
        let fetcher = Arc::new(fetcher);

        let jukebox = Arc::new(Jukebox::new(
            config,
            media.path(),
            Arc::new(gateway.clone()),
            presence.clone(),
            fetcher.clone(),
        ));

        Self {
            jukebox,
            gateway,
            presence,
            fetcher,
            media,
        }
    }
}
