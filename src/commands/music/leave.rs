use super::*;
use crate::commands::music::utils::embedded_messages;

/// Leave the voice channel
#[poise::command(slash_command, category = "Music")]
pub async fn leave(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(&ctx)?;

    // Try to leave the voice channel
    match ctx.data().jukebox.leave(guild_id).await {
        Ok(()) => {
            ctx.send(embedded_messages::left_voice_channel()).await?;
        }
        Err(err) => {
            ctx.send(embedded_messages::music_error(&err)).await?;
        }
    }

    Ok(())
}
