use poise::{serenity_prelude as serenity, CreateReply};
use serenity::all::CreateEmbed;
use serenity::model::id::ChannelId;

use super::music_manager::MusicError;
use super::playback_session::{PlayOutcome, PlayerState, QueueSummary, StopOutcome, VoteOutcome};
use crate::commands::music::audio_sources::AudioItem;

const SUCCESS: u32 = 0x00ff00;
const NEUTRAL: u32 = 0xffa500;
const FAILURE: u32 = 0xff0000;

fn reply(title: &str, description: impl Into<String>, color: u32) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title(title)
            .description(description)
            .color(color),
    )
}

/// Create an embed for the result of a play request
pub fn play_outcome(outcome: &PlayOutcome) -> CreateReply {
    match outcome {
        PlayOutcome::Started { name } => reply("🎵 Now Playing", name.as_str(), SUCCESS),
        PlayOutcome::Queued { name, position } => CreateReply::default().embed(
            CreateEmbed::new()
                .title("🎵 Added to Queue")
                .description(name.as_str())
                .field("Position", format!("`#{}`", position), true)
                .color(SUCCESS),
        ),
        PlayOutcome::Ignored { name } => reply(
            "🔒 Queue Playing",
            format!("Not playing '{}' while queued music is on", name),
            NEUTRAL,
        )
        .ephemeral(true),
    }
}

/// Create an embed for the result of a skip or clear request
pub fn vote_outcome(outcome: &VoteOutcome) -> CreateReply {
    match outcome {
        VoteOutcome::Skipped => reply("⏭️ Skipped", "Skipped the current track", SUCCESS),
        VoteOutcome::Cleared => reply(
            "🗑️ Cleared",
            "Stopped playback and cleared the queue",
            SUCCESS,
        ),
        VoteOutcome::Recorded { count, threshold } => reply(
            "🗳️ Vote Recorded",
            format!("{}/{} votes", count, threshold),
            NEUTRAL,
        ),
    }
}

/// Create an embed for the result of a stop request
pub fn stop_outcome(outcome: StopOutcome) -> CreateReply {
    match outcome {
        StopOutcome::Stopped => reply("⏹️ Stopped", "Playback stopped", SUCCESS),
        StopOutcome::Ignored => reply(
            "⏹️ Nothing Stopped",
            "Only one-off sounds can be stopped. Use /skip or /clear for queued music",
            NEUTRAL,
        )
        .ephemeral(true),
    }
}

/// Create an embed for the music queue
pub fn music_queue(summary: &QueueSummary, preview: usize) -> CreateReply {
    let mut description = String::new();

    match &summary.current {
        Some(name) => {
            let marker = if summary.state == PlayerState::Locked {
                "🔒"
            } else {
                "🎵"
            };
            description.push_str(&format!("**{} Now Playing**\n{}\n\n", marker, name));
        }
        None => description.push_str("**🔇 Nothing playing**\n\n"),
    }

    if summary.queued.is_empty() {
        description.push_str("**📭 Queue is empty**");
    } else {
        description.push_str(&format!(
            "**📋 Queue - {} tracks**\n",
            summary.queued.len()
        ));
        for (index, name) in summary.queued.iter().take(preview).enumerate() {
            description.push_str(&format!("`{}.` {}\n", index + 1, name));
        }
        if summary.queued.len() > preview {
            description.push_str(&format!("…and {} more", summary.queued.len() - preview));
        }
    }

    reply("🎵 Music Queue", description, SUCCESS)
}

/// Create an embed for the item currently streaming
pub fn now_playing(item: Option<&AudioItem>) -> CreateReply {
    let Some(item) = item else {
        return reply("🔇 Nothing Playing", "Nothing is playing right now", NEUTRAL);
    };

    let description = match item.origin_url() {
        Some(url) => format!("[{}]({})", item.name(), url),
        None => item.name().to_string(),
    };

    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎵 Now Playing")
            .description(description)
            .field("Requested by", format!("<@{}>", item.requester()), true)
            .field(
                "Started",
                format!(
                    "<t:{}:R>",
                    item.started_at()
                        .unwrap_or_else(|| item.requested_at())
                        .timestamp()
                ),
                true,
            )
            .color(SUCCESS),
    )
}

/// Create an embed for when the bot joins a voice channel
pub fn joined_voice_channel(channel_id: ChannelId) -> CreateReply {
    reply("🔊 Joined", format!("Connected to <#{}>", channel_id), SUCCESS)
}

/// Create an embed for when the bot leaves a voice channel
pub fn left_voice_channel() -> CreateReply {
    reply(
        "👋 Left Voice Channel",
        "Successfully disconnected and cleared the queue",
        SUCCESS,
    )
}

/// Create an embed for a failed music operation
pub fn music_error(err: &MusicError) -> CreateReply {
    let title = match err {
        MusicError::AlreadyDownloaded(_) => "📁 Already Downloaded",
        MusicError::MediaRejected(_) => "🚫 Rejected",
        MusicError::NoChannel | MusicError::NotInChannel => "🔈 Voice Channel Needed",
        MusicError::NothingPlaying => "🔇 Nothing Playing",
        _ => "❌ Error",
    };

    let description = match err {
        MusicError::AlreadyDownloaded(name) => {
            format!("'{}' was already downloaded for this server", name)
        }
        other => other.to_string(),
    };

    reply(title, description, FAILURE).ephemeral(true)
}

/// Create an embed listing archived sounds
pub fn sound_list(sounds: &[String]) -> CreateReply {
    if sounds.is_empty() {
        return reply("📼 Sounds", "No sounds saved yet", NEUTRAL);
    }

    reply("📼 Sounds", sounds.join(", "), SUCCESS)
}

/// Create an embed for an archive lookup miss
pub fn sound_not_found(name: &str) -> CreateReply {
    reply(
        "❓ Unknown Sound",
        format!("No sound called '{}'", name),
        FAILURE,
    )
    .ephemeral(true)
}

/// Create an embed for a saved sound
pub fn sound_saved(name: &str) -> CreateReply {
    reply("💾 Saved", format!("Saved sound '{}'", name), SUCCESS)
}

/// Create an embed for a removed sound
pub fn sound_removed(name: &str) -> CreateReply {
    reply("🗑️ Removed", format!("Removed sound '{}'", name), SUCCESS)
}
