use super::*;
use crate::commands::music::utils::embedded_messages;
use tracing::warn;

/// Join your voice channel
#[poise::command(slash_command, category = "Music")]
pub async fn join(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(&ctx)?;

    let reply = match ctx
        .data()
        .jukebox
        .join_channel(guild_id, ctx.author().id)
        .await
    {
        Ok(channel_id) => embedded_messages::joined_voice_channel(channel_id),
        Err(err) => {
            warn!("Join failed in guild {}: {}", guild_id, err);
            embedded_messages::music_error(&err)
        }
    };
    ctx.send(reply).await?;

    Ok(())
}
