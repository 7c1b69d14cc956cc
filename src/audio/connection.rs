use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId};
use tracing::{debug, info, warn};

use crate::audio::transport::{ConnectionHandle, VoiceTransport};
use crate::error::ConnectError;

/// Owns connect / move / disconnect for guilds.
///
/// Stateless apart from the transport: the cached handle lives in the
/// caller's `GuildState` and is passed in as `current`.
pub struct ConnectionManager {
    transport: Arc<dyn VoiceTransport>,
    reset_delay: Duration,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn VoiceTransport>, reset_delay: Duration) -> Self {
        Self {
            transport,
            reset_delay,
        }
    }

    pub fn transport(&self) -> &Arc<dyn VoiceTransport> {
        &self.transport
    }

    /// Reuses a live connection to `channel_id`, moves a live connection in
    /// another channel, or connects fresh.
    pub async fn ensure_connected(
        &self,
        current: &mut Option<ConnectionHandle>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, ConnectError> {
        if let Some(handle) = *current {
            if self.transport.is_connected(&handle).await {
                if handle.channel_id == channel_id {
                    return Ok(handle);
                }

                let moved = self
                    .transport
                    .move_to(&handle, channel_id)
                    .await
                    .map_err(ConnectError::MoveFailed)?;
                info!("🔀 Moved to channel {} in guild {}", channel_id, guild_id);
                *current = Some(moved);
                return Ok(moved);
            }

            debug!("Cached connection for guild {} is dead, reconnecting", guild_id);
            *current = None;
        }

        let handle = self.connect_with_reset(current, guild_id, channel_id).await?;
        *current = Some(handle);
        Ok(handle)
    }

    /// Connects; on a session-invalid close, tears down whatever is cached,
    /// waits `reset_delay` and tries exactly once more. Any other failure
    /// goes straight back to the caller.
    pub async fn connect_with_reset(
        &self,
        current: &mut Option<ConnectionHandle>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, ConnectError> {
        match self.transport.connect(guild_id, channel_id).await {
            Ok(handle) => {
                info!("🔊 Connected to channel {} in guild {}", channel_id, guild_id);
                Ok(handle)
            }
            Err(e) if e.is_session_invalid() => {
                warn!(
                    "🔁 Voice session invalidated in guild {}, hard resetting: {}",
                    guild_id, e
                );
                let stale = current.take().unwrap_or(ConnectionHandle {
                    guild_id,
                    channel_id,
                });
                if let Err(e) = self.transport.disconnect(&stale, true).await {
                    debug!("Ignoring teardown error during reset: {}", e);
                }

                tokio::time::sleep(self.reset_delay).await;

                let handle = self
                    .transport
                    .connect(guild_id, channel_id)
                    .await
                    .map_err(ConnectError::ResetFailed)?;
                info!(
                    "🔊 Connected to channel {} in guild {} after reset",
                    channel_id, guild_id
                );
                Ok(handle)
            }
            Err(e) => Err(ConnectError::Failed(e)),
        }
    }

    /// Best-effort: teardown errors are logged and swallowed, and the cached
    /// handle is always dropped.
    pub async fn disconnect(&self, current: &mut Option<ConnectionHandle>, force: bool) {
        if let Some(handle) = current.take() {
            match self.transport.disconnect(&handle, force).await {
                Ok(()) => info!("👋 Disconnected from voice in guild {}", handle.guild_id),
                Err(e) => warn!(
                    "Disconnect from guild {} failed, dropping handle anyway: {}",
                    handle.guild_id, e
                ),
            }
        }
    }

    pub async fn is_playing(&self, current: Option<&ConnectionHandle>) -> bool {
        match current {
            Some(handle) => self.transport.is_playing(handle).await,
            None => false,
        }
    }
}
