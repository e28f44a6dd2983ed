use super::*;
use crate::commands::music::utils::embedded_messages;

/// Stop a one-off sound
#[poise::command(slash_command, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(&ctx)?;

    let outcome = ctx.data().jukebox.stop(guild_id).await;
    ctx.send(embedded_messages::stop_outcome(outcome)).await?;

    Ok(())
}
