use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::CreateEmbed;
use std::time::Duration;

use crate::{CommandResult, Context};

/// Ping the bot to check its latency
#[poise::command(slash_command, category = "General")]
pub async fn ping(ctx: Context<'_>) -> CommandResult {
    let latency = get_shard_latency(&ctx)
        .await
        .unwrap_or_default()
        .as_millis();
    let sessions = ctx.data().jukebox.registry().len();

    let embed = CreateEmbed::new()
        .title("Pong!")
        .field("API Latency", format!("{} ms", latency), true)
        .field("Voice Sessions", sessions.to_string(), true);

    ctx.send(CreateReply::default().embed(embed)).await?;

    Ok(())
}

async fn get_shard_latency(ctx: &Context<'_>) -> Option<Duration> {
    let shard_manager = ctx.framework().shard_manager();
    let runners = shard_manager.runners.lock().await;

    // Latency of the shard runner this command arrived on
    let runner = runners.get(&serenity::ShardId(ctx.serenity_context().shard_id.0))?;

    runner.latency
}
