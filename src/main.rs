use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use jukebot::commands::music::utils::discord_voice::{CachePresence, SongbirdGateway};
use jukebot::{Config, Data, Error, Jukebox, SoundArchive, YtDlpFetcher, events};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jukebot=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Arc::new(Config::from_env()?);
    let token = config.discord_token()?.to_string();

    let archive = SoundArchive::open(&config.database_path)?;

    info!("Starting with command prefix '{}'", config.command_prefix);
    let songbird = songbird::Songbird::serenity();
    let http = reqwest::Client::new();

    let prefix = config.command_prefix.clone();
    let setup_songbird = Arc::clone(&songbird);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: jukebot::commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let jukebox = Arc::new(Jukebox::new(
                    config.player.clone(),
                    config.media_dir.clone(),
                    Arc::new(SongbirdGateway::new(setup_songbird, http)),
                    Arc::new(CachePresence::new(ctx.cache.clone())),
                    Arc::new(YtDlpFetcher::default()),
                ));

                // The reaper lives for the whole process
                jukebox.spawn_reaper();

                Ok(Data {
                    jukebox,
                    archive,
                    config,
                })
            })
        });

    let mut client = ClientBuilder::new(token, jukebot::intents())
        .framework(framework.build())
        .register_songbird_with(songbird)
        .await?;

    client.start().await.map_err(Into::into)
}
