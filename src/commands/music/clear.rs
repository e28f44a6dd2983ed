use super::*;
use crate::commands::music::utils::embedded_messages;

/// Stop playback and drop the queue, by vote while queued music plays
#[poise::command(slash_command, category = "Music")]
pub async fn clear(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(&ctx)?;
    let is_moderator = crate::is_moderator(ctx).await?;

    let reply = match ctx
        .data()
        .jukebox
        .clear(guild_id, ctx.author().id, is_moderator)
        .await
    {
        Ok(outcome) => embedded_messages::vote_outcome(&outcome),
        Err(err) => embedded_messages::music_error(&err),
    };
    ctx.send(reply).await?;

    Ok(())
}
