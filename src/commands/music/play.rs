use super::*;
use crate::commands::music::audio_sources::PlayRequest;
use crate::commands::music::utils::embedded_messages;
use crate::utils::database::SoundArchive;
use tracing::{info, warn};
use url::Url;

/// Play a media link or an archived sound
#[poise::command(slash_command, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Media URL or sound name"] query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let guild_id = guild_id(&ctx)?;

    let Some(request) = request_for(&ctx.data().archive, guild_id, &query)? else {
        ctx.send(embedded_messages::sound_not_found(query.trim()))
            .await?;
        return Ok(());
    };

    // Defer the response since downloads might take time
    ctx.defer().await?;

    let reply = match ctx
        .data()
        .jukebox
        .play(guild_id, ctx.author().id, request)
        .await
    {
        Ok(outcome) => embedded_messages::play_outcome(&outcome),
        Err(err) => {
            warn!("Play failed in guild {}: {}", guild_id, err);
            embedded_messages::music_error(&err)
        }
    };
    ctx.send(reply).await?;

    Ok(())
}

/// Links are played as remote media; anything else names an archived sound.
pub(crate) fn request_for(
    archive: &SoundArchive,
    guild_id: GuildId,
    query: &str,
) -> rusqlite::Result<Option<PlayRequest>> {
    let query = query.trim();
    if looks_like_url(query) {
        return Ok(Some(PlayRequest::RemoteUrl(query.to_string())));
    }

    Ok(archive
        .lookup_playable(guild_id, query)?
        .map(PlayRequest::from))
}

fn looks_like_url(query: &str) -> bool {
    Url::parse(query).is_ok_and(|url| url.has_host())
}
