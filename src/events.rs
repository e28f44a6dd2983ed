//! Gateway events the bot reacts to outside of slash commands.

use poise::serenity_prelude as serenity;
use serenity::{FullEvent, GuildId, Message};
use tracing::{debug, info, warn};

use crate::commands::music::play::request_for;
use crate::commands::music::utils::music_manager::{Jukebox, MusicError};
use crate::{Data, Error};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!("Logged in as {}", data_about_bot.user.name);
        }
        FullEvent::VoiceStateUpdate { new, .. } => {
            if let Some(guild_id) = new.guild_id {
                data.jukebox.refresh_members(guild_id).await;
            }
        }
        FullEvent::GuildDelete { incomplete, .. } => {
            // Outages also remove guilds; only a real leave ends the session
            if !incomplete.unavailable {
                info!("Removed from guild {}, dropping its session", incomplete.id);
                drop_guild_session(&data.jukebox, incomplete.id).await;
            }
        }
        FullEvent::Message { new_message } => {
            sound_trigger(ctx, new_message, framework, data).await?;
        }
        _ => {}
    }

    Ok(())
}

/// Tear down the voice session of a server the bot was removed from.
pub async fn drop_guild_session(jukebox: &Jukebox, guild_id: GuildId) {
    match jukebox.leave(guild_id).await {
        Ok(()) => debug!("Dropped the voice session of guild {}", guild_id),
        Err(MusicError::NotConnected) => debug!("No voice session in guild {}", guild_id),
        Err(err) => warn!("Leaving guild {} failed: {}", guild_id, err),
    }
}

/// Play an archived sound for messages like `!airhorn`.
async fn sound_trigger(
    ctx: &serenity::Context,
    message: &Message,
    framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if message.author.bot {
        return Ok(());
    }
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };
    let Some(name) = trigger_name(&message.content, &data.config.command_prefix) else {
        return Ok(());
    };

    // Prefix commands share the prefix
    if framework
        .options()
        .commands
        .iter()
        .any(|command| command.name == name || command.aliases.iter().any(|a| a == name))
    {
        return Ok(());
    }

    let Some(request) = request_for(&data.archive, guild_id, name)? else {
        debug!("No sound '{}' in guild {}", name, guild_id);
        return Ok(());
    };

    match data.jukebox.play(guild_id, message.author.id, request).await {
        Ok(outcome) => debug!("Sound trigger '{}' in guild {}: {:?}", name, guild_id, outcome),
        Err(err) => {
            warn!("Sound trigger '{}' failed in guild {}: {}", name, guild_id, err);
            message.reply(ctx, err.to_string()).await?;
        }
    }

    Ok(())
}

fn trigger_name<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let name = content.strip_prefix(prefix)?.trim();
    (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
}
