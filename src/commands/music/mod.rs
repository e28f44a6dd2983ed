pub mod clear;
pub mod current;
pub mod join;
pub mod leave;
pub mod play;
pub mod queue;
pub mod skip;
pub mod sounds;
pub mod stop;

pub mod audio_sources;
pub mod utils;

use crate::{CommandResult, Context, Error};
use poise::serenity_prelude as serenity;
use serenity::model::id::GuildId;

use utils::music_manager::MusicError;

/// The guild the command was invoked in.
fn guild_id(ctx: &Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| Box::new(MusicError::NotInGuild) as Error)
}
