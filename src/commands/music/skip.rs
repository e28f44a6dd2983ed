use super::*;
use crate::commands::music::utils::embedded_messages;

/// Skip the current track, or vote to skip queued music
#[poise::command(slash_command, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(&ctx)?;
    let is_moderator = crate::is_moderator(ctx).await?;

    let reply = match ctx
        .data()
        .jukebox
        .skip(guild_id, ctx.author().id, is_moderator)
        .await
    {
        Ok(outcome) => embedded_messages::vote_outcome(&outcome),
        Err(err) => embedded_messages::music_error(&err),
    };
    ctx.send(reply).await?;

    Ok(())
}
