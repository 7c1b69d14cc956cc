use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{Command, CommandOptionType},
        id::GuildId,
    },
    prelude::Context,
};

/// Every slash command the bot answers to.
pub fn all() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        queue_command(),
        remove_command(),
        clear_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        pingvc_command(),
    ]
}

/// Replaces the global command set.
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all()).await?;
    Ok(())
}

/// Replaces one guild's command set. Guild commands show up instantly,
/// which is what you want while developing.
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all()).await?;
    Ok(())
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song, playlist or album from YouTube, SoundCloud or Spotify")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "A link, or words to search YouTube for",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current track")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Show what's coming up")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .required(false)
                .min_int_value(1),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a track from the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Position in the queue, as shown by /queue",
            )
            .required(true)
            .min_int_value(1),
        )
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Clear the queue (the current track keeps playing)")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause playback")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume playback")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop, clear the queue and leave voice")
}

fn pingvc_command() -> CreateCommand {
    CreateCommand::new("pingvc")
        .description("Test voice connect: join your voice and leave after 2s")
}
