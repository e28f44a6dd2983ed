use super::*;
use crate::commands::music::utils::embedded_messages;

/// View the current music queue
#[poise::command(slash_command, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(&ctx)?;

    let summary = ctx.data().jukebox.queue_summary(guild_id).await;
    let preview = ctx.data().config.player.queue_preview;
    ctx.send(embedded_messages::music_queue(&summary, preview))
        .await?;

    Ok(())
}
