//! Discord-facing side of the bot.
//!
//! Holds the [`MusicBot`] event handler, which owns the [`MusicPlayer`] and
//! translates gateway events into player calls:
//!
//! - `ready`: registers slash commands (per guild or globally)
//! - `interaction_create`: dispatches slash commands to [`handlers`]
//! - `voice_state_update`: notices when the bot was kicked from voice or
//!   left alone in its channel

pub mod announcer;
pub mod commands;
pub mod handlers;

use std::sync::Arc;

use anyhow::Result;
use serenity::{
    async_trait,
    model::{
        application::Interaction,
        gateway::Ready,
        id::{ChannelId, GuildId},
        voice::VoiceState,
    },
    prelude::*,
};
use tracing::{debug, error, info, warn};

use crate::{audio::player::MusicPlayer, config::Config};

/// Serenity event handler for the music bot.
///
/// ## Fields
///
/// - `config`: settings loaded at startup (command scope, leave-when-alone)
/// - `player`: every music operation the commands call
pub struct MusicBot {
    config: Arc<Config>,
    pub player: Arc<MusicPlayer>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, player: Arc<MusicPlayer>) -> Self {
        Self { config, player }
    }

    /// Registers slash commands in the configured development guild, or
    /// globally when none is set.
    ///
    /// Global commands can take up to an hour to propagate; guild commands
    /// are available right away.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of configured guild {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Guild command registration failed: {:?}", e);
                    anyhow::anyhow!(
                        "Could not register guild commands. Check the bot has the 'applications.commands' scope in that guild."
                    )
                })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Global command registration failed: {:?}", e);
                    anyhow::anyhow!(
                        "Could not register global commands. Check the bot has the 'applications.commands' scope."
                    )
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Command registration failed: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Two cases matter here:
    ///
    /// - **Bot disconnected** by someone else: the guild's state is torn
    ///   down without trying to leave again.
    /// - **Bot left alone** after the last human left its channel: the bot
    ///   leaves, if `leave_when_alone` is on.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let bot_id = ctx.cache.current_user().id;

        if new.user_id == bot_id {
            if let (Some(old), None) = (&old, new.channel_id) {
                info!("🔌 Bot was disconnected from voice in guild {}", guild_id);
                self.player.voice_disconnected(guild_id, old.channel_id);
            }
            return;
        }

        if !self.config.leave_when_alone {
            return;
        }

        let left_channel = old.and_then(|state| state.channel_id);
        if left_channel.is_none() || left_channel == new.channel_id {
            return;
        }

        if let Some((channel_id, humans)) = bot_channel_occupancy(&ctx, guild_id) {
            if Some(channel_id) == left_channel && humans == 0 {
                self.player.channel_emptied(guild_id);
            } else {
                debug!("{} listeners left in {} (guild {})", humans, channel_id, guild_id);
            }
        }
    }
}

/// The bot's current voice channel in `guild_id` and how many non-bot
/// users share it, from the gateway cache.
fn bot_channel_occupancy(ctx: &Context, guild_id: GuildId) -> Option<(ChannelId, usize)> {
    let bot_id = ctx.cache.current_user().id;
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let channel_id = guild.voice_states.get(&bot_id)?.channel_id?;

    let humans = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id) && state.user_id != bot_id)
        .filter(|state| !state.member.as_ref().is_some_and(|member| member.user.bot))
        .count();

    Some((channel_id, humans))
}
