//! The voice-gateway capability the playback core drives.
//!
//! The real implementation lives in [`songbird_transport`](super::songbird_transport);
//! tests plug in an in-memory one.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;

/// Gateway close code for "session no longer valid".
pub const SESSION_INVALID_CLOSE_CODE: u16 = 4006;

/// Identifies a live voice connection. Cheap to copy; the transport keeps
/// the actual session keyed by guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Invoked exactly once when a playback ends, with the error text if it
/// ended badly. Stopping a track counts as ending it.
pub type PlaybackCallback = Box<dyn FnOnce(Option<String>) + Send + 'static>;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("voice gateway error{}: {message}", close_code_suffix(.code))]
    Gateway { code: Option<u16>, message: String },

    #[error("not connected to voice in this guild")]
    NotConnected,

    #[error("playback error: {0}")]
    Playback(String),
}

fn close_code_suffix(code: &Option<u16>) -> String {
    code.map(|c| format!(" (close code {c})")).unwrap_or_default()
}

impl TransportError {
    pub fn gateway(code: Option<u16>, message: impl Into<String>) -> Self {
        Self::Gateway {
            code,
            message: message.into(),
        }
    }

    /// The one failure that warrants a hard reset of the voice session.
    pub fn is_session_invalid(&self) -> bool {
        matches!(
            self,
            Self::Gateway {
                code: Some(SESSION_INVALID_CLOSE_CODE),
                ..
            }
        )
    }
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, TransportError>;

    async fn move_to(
        &self,
        handle: &ConnectionHandle,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, TransportError>;

    async fn disconnect(&self, handle: &ConnectionHandle, force: bool) -> Result<(), TransportError>;

    /// Starts streaming `stream_url`, replacing whatever was playing.
    async fn play(
        &self,
        handle: &ConnectionHandle,
        stream_url: &str,
        on_complete: PlaybackCallback,
    ) -> Result<(), TransportError>;

    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn pause(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn resume(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn is_connected(&self, handle: &ConnectionHandle) -> bool;

    /// True only while audio is actively going out; paused counts as not playing.
    async fn is_playing(&self, handle: &ConnectionHandle) -> bool;
}
