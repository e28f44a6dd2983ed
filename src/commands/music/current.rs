use super::*;
use crate::commands::music::utils::embedded_messages;

/// Show what is playing right now
#[poise::command(slash_command, category = "Music")]
pub async fn current(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(&ctx)?;

    let item = ctx.data().jukebox.current(guild_id).await;
    ctx.send(embedded_messages::now_playing(item.as_ref()))
        .await?;

    Ok(())
}
