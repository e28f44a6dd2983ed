use super::*;
use crate::commands::music::utils::embedded_messages;
use crate::utils::database::SoundKind;
use tracing::info;
use url::Url;

/// List archived sounds
#[poise::command(slash_command, category = "Sounds")]
pub async fn sounds(
    ctx: Context<'_>,
    #[description = "Only list sounds starting with this"] prefix: Option<String>,
) -> CommandResult {
    let guild_id = guild_id(&ctx)?;

    let names = ctx
        .data()
        .archive
        .list_sounds(guild_id, prefix.as_deref().unwrap_or(""))?;
    ctx.send(embedded_messages::sound_list(&names)).await?;

    Ok(())
}

/// Save a sound file or media link under a name
#[poise::command(
    slash_command,
    category = "Sounds",
    required_permissions = "ADMINISTRATOR"
)]
pub async fn save_sound(
    ctx: Context<'_>,
    #[description = "Name to play it by"] name: String,
    #[description = "File in the server's media folder, or a media URL"] reference: String,
) -> CommandResult {
    let guild_id = guild_id(&ctx)?;
    let name = name.trim();
    let reference = reference.trim();

    let kind = if Url::parse(reference).is_ok_and(|url| url.has_host()) {
        SoundKind::Remote
    } else {
        SoundKind::Local
    };

    ctx.data()
        .archive
        .save_sound(guild_id, name, kind, reference)?;
    info!("{} saved sound '{}' in guild {}", ctx.author().name, name, guild_id);
    ctx.send(embedded_messages::sound_saved(name)).await?;

    Ok(())
}

/// Remove a sound from the archive
#[poise::command(
    slash_command,
    category = "Sounds",
    required_permissions = "ADMINISTRATOR"
)]
pub async fn remove_sound(
    ctx: Context<'_>,
    #[description = "Name of the sound"] name: String,
) -> CommandResult {
    let guild_id = guild_id(&ctx)?;
    let name = name.trim();

    if ctx.data().archive.remove_sound(guild_id, name)? {
        ctx.send(embedded_messages::sound_removed(name)).await?;
    } else {
        ctx.send(embedded_messages::sound_not_found(name)).await?;
    }

    Ok(())
}
