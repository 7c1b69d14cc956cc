use std::sync::Arc;

use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{notice::Announcer, player::PlayRequest},
    bot::{announcer::DiscordAnnouncer, MusicBot},
    error::MusicError,
};

/// Dispatches a slash command.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(ctx, &command, "This command only works in a server.").await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, guild_id, bot).await,
        "skip" => handle_skip(ctx, &command, guild_id, bot).await,
        "queue" => handle_queue(ctx, &command, guild_id, bot).await,
        "remove" => handle_remove(ctx, &command, guild_id, bot).await,
        "clear" => handle_clear(ctx, &command, guild_id, bot).await,
        "pause" => handle_pause(ctx, &command, guild_id, bot).await,
        "resume" => handle_resume(ctx, &command, guild_id, bot).await,
        "stop" => handle_stop(ctx, &command, guild_id, bot).await,
        "pingvc" => handle_pingvc(ctx, &command, guild_id, bot).await,
        other => {
            warn!("Unknown command /{}", other);
            respond(ctx, &command, "Unknown command.").await
        }
    }
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let Some(query) = string_option(command, "query") else {
        return respond(ctx, command, "Tell me what to play.").await;
    };

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, &MusicError::UserNotInVoice.to_string()).await;
    };

    // Resolving can take a while; Discord wants an answer within 3 seconds.
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let announcer: Arc<dyn Announcer> =
        Arc::new(DiscordAnnouncer::new(ctx.http.clone(), command.channel_id));
    let request = PlayRequest {
        guild_id,
        channel_id,
        user_id: command.user.id,
        query: query.to_string(),
        announcer: Some(announcer),
    };

    let content = match bot.player.play(request).await {
        Ok(reply) => reply.summary(),
        Err(e) => {
            warn!("/play \"{}\" failed in guild {}: {}", query, guild_id, e);
            e.to_string()
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let content = if bot.player.skip(guild_id).await {
        "⏭️ Skipped."
    } else {
        "Nothing is playing."
    };
    respond(ctx, command, content).await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let page = integer_option(command, "page").unwrap_or(1);
    let (now_playing, page) = bot.player.queue(guild_id, page).await;

    let mut content = String::new();
    if let Some(track) = now_playing {
        content.push_str(&format!("🎵 Now playing: {}\n\n", track.title));
    }
    content.push_str(&page.render());
    respond(ctx, command, &content).await
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let Some(index) = integer_option(command, "index") else {
        return respond(ctx, command, "Which position should I remove?").await;
    };

    let content = match bot.player.remove(guild_id, index).await {
        Some(track) => format!("🗑️ Removed {}", track.title),
        None => "Invalid index.".to_string(),
    };
    respond(ctx, command, &content).await
}

async fn handle_clear(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let content = if bot.player.clear(guild_id).await {
        "🧹 Queue cleared."
    } else {
        "The queue is already empty."
    };
    respond(ctx, command, content).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let content = if bot.player.pause(guild_id).await {
        "⏸️ Paused."
    } else {
        "Nothing is playing."
    };
    respond(ctx, command, content).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let content = if bot.player.resume(guild_id).await {
        "▶️ Resumed."
    } else {
        "Nothing is paused."
    };
    respond(ctx, command, content).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let content = if bot.player.stop(guild_id).await {
        "⏹️ Stopped and left the voice channel."
    } else {
        "I'm not playing anything."
    };
    respond(ctx, command, content).await
}

async fn handle_pingvc(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, "Join a voice channel first.").await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let content = match bot.player.ping_voice(guild_id, channel_id).await {
        Ok(_) => "Connected. Leaving in 2s…".to_string(),
        Err(e) => {
            warn!("Voice check failed in guild {}: {}", guild_id, e);
            format!("Failed: {e}")
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Positive integer option; zero and negatives count as missing.
fn integer_option(command: &CommandInteraction, name: &str) -> Option<usize> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
        .and_then(|value| usize::try_from(value).ok())
        .filter(|value| *value > 0)
}

/// The voice channel `user_id` is sitting in, from the gateway cache.
pub fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
