//! Jukebot: a Discord bot that runs one voice playback session per server.
//!
//! The interesting part lives in [`commands::music::utils`]: the per-server
//! [`PlaybackSession`] state machine, its vote subsystem, the session
//! registry and the idle reaper. [`commands::music::audio_sources`] turns
//! play requests into playable items; everything else is command glue.

use std::sync::Arc;

use poise::serenity_prelude as serenity;

pub mod commands;
pub mod config;
pub mod events;
pub mod utils;

pub use commands::music::audio_sources::{
    AudioItem, AudioResolver, AudioSource, MediaFetcher, MediaInfo, PlayRequest, YtDlpFetcher,
};
pub use commands::music::utils::idle_reaper::{ReapReport, reap_idle_sessions, spawn_idle_reaper};
pub use commands::music::utils::music_manager::{Jukebox, MusicError, MusicResult};
pub use commands::music::utils::playback_session::{
    PlayOutcome, PlaybackSession, PlayerState, QueueSummary, ReapAction, SharedSession,
    StopOutcome, VoteOutcome,
};
pub use commands::music::utils::session_registry::SessionRegistry;
pub use commands::music::utils::voice::{Presence, VoiceConnection, VoiceGateway};
pub use commands::music::utils::event_handlers::TrackEndSignal;
pub use config::{Config, ConfigError, LivePolicy, PlayerConfig};
pub use utils::database::{Playable, SoundArchive, SoundKind};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// State shared by every command invocation and event.
pub struct Data {
    pub jukebox: Arc<Jukebox>,
    pub archive: SoundArchive,
    pub config: Arc<Config>,
}

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

/// Whether the invoking member moderates this server (administrator permission).
pub async fn is_moderator(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(member) = ctx.author_member().await else {
        return Ok(false);
    };

    let permissions = match member.permissions {
        Some(permissions) => permissions,
        None => ctx
            .guild()
            .map(|guild| guild.member_permissions(&member))
            .unwrap_or_default(),
    };

    Ok(permissions.administrator())
}

/// Every command the bot registers.
pub fn commands() -> Vec<poise::Command<Data, Error>> {
    use commands::general::ping::*;
    use commands::music::{
        clear::*, current::*, join::*, leave::*, play::*, queue::*, skip::*, sounds::*, stop::*,
    };

    vec![
        // Default commands
        register(),
        help(),
        // General commands
        ping(),
        // Music commands
        play(),
        skip(),
        clear(),
        stop(),
        queue(),
        current(),
        join(),
        leave(),
        sounds(),
        save_sound(),
        remove_sound(),
    ]
}

/// Gateway intents the bot needs: message content for sound triggers and
/// voice states for presence lookups.
pub fn intents() -> serenity::GatewayIntents {
    serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES
}
