use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::JoinError,
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use tracing::{debug, info, warn};

use crate::audio::transport::{
    ConnectionHandle, PlaybackCallback, TransportError, VoiceTransport, SESSION_INVALID_CLOSE_CODE,
};

/// [`VoiceTransport`] over songbird's call manager.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
    current_tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            volume: volume.clamp(0.0, 2.0),
            current_tracks: DashMap::new(),
        }
    }

    fn track(&self, guild_id: GuildId) -> Result<TrackHandle, TransportError> {
        self.current_tracks
            .get(&guild_id)
            .map(|track| track.value().clone())
            .ok_or_else(|| TransportError::Playback("nothing is playing".to_string()))
    }
}

/// songbird doesn't surface gateway close codes as data, so "session no
/// longer valid" is recognised from the error text.
fn map_join_error(error: JoinError) -> TransportError {
    let text = format!("{:?}", error);
    let lowered = text.to_lowercase();
    let session_invalid = text.contains(&SESSION_INVALID_CLOSE_CODE.to_string())
        || lowered.contains("sessionnolongervalid")
        || lowered.contains("session no longer valid");

    let code = session_invalid.then_some(SESSION_INVALID_CLOSE_CODE);
    TransportError::gateway(code, text)
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, TransportError> {
        debug!("🔗 Joining channel {} in guild {}", channel_id, guild_id);
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(map_join_error)?;
        Ok(ConnectionHandle {
            guild_id,
            channel_id,
        })
    }

    async fn move_to(
        &self,
        handle: &ConnectionHandle,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, TransportError> {
        // Joining another channel with a live call moves it.
        self.connect(handle.guild_id, channel_id).await
    }

    async fn disconnect(&self, handle: &ConnectionHandle, force: bool) -> Result<(), TransportError> {
        if let Some((_, track)) = self.current_tracks.remove(&handle.guild_id) {
            let _ = track.stop();
        }

        if !force {
            self.manager
                .leave(handle.guild_id)
                .await
                .map_err(map_join_error)?;
        }
        match self.manager.remove(handle.guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(map_join_error(e)),
        }
    }

    async fn play(
        &self,
        handle: &ConnectionHandle,
        stream_url: &str,
        on_complete: PlaybackCallback,
    ) -> Result<(), TransportError> {
        let call = self
            .manager
            .get(handle.guild_id)
            .ok_or(TransportError::NotConnected)?;

        let input = Input::from(HttpRequest::new(self.http.clone(), stream_url.to_string()));
        let track = {
            let mut call = call.lock().await;
            call.play_only_input(input)
        };
        let _ = track.set_volume(self.volume);

        // End and Error share one slot so the callback fires exactly once.
        let slot = Arc::new(Mutex::new(Some(on_complete)));
        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id: handle.guild_id,
                        slot: slot.clone(),
                    },
                )
                .map_err(|e| TransportError::Playback(format!("could not watch track: {e}")))?;
        }

        self.current_tracks.insert(handle.guild_id, track);
        Ok(())
    }

    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let track = self.track(handle.guild_id)?;
        track
            .stop()
            .map_err(|e| TransportError::Playback(e.to_string()))
    }

    async fn pause(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let track = self.track(handle.guild_id)?;
        track
            .pause()
            .map_err(|e| TransportError::Playback(e.to_string()))?;
        info!("⏸️ Paused in guild {}", handle.guild_id);
        Ok(())
    }

    async fn resume(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let track = self.track(handle.guild_id)?;
        track
            .play()
            .map_err(|e| TransportError::Playback(e.to_string()))?;
        info!("▶️ Resumed in guild {}", handle.guild_id);
        Ok(())
    }

    async fn is_connected(&self, handle: &ConnectionHandle) -> bool {
        match self.manager.get(handle.guild_id) {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }

    async fn is_playing(&self, handle: &ConnectionHandle) -> bool {
        let Ok(track) = self.track(handle.guild_id) else {
            return false;
        };
        match track.get_info().await {
            Ok(info) => matches!(info.playing, PlayMode::Play),
            Err(_) => false,
        }
    }
}

struct TrackEndNotifier {
    guild_id: GuildId,
    slot: Arc<Mutex<Option<PlaybackCallback>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            }),
            _ => None,
        };

        let callback = self.slot.lock().take();
        if let Some(callback) = callback {
            match &error {
                Some(e) => warn!("Track in guild {} failed: {}", self.guild_id, e),
                None => debug!("Track in guild {} ended", self.guild_id),
            }
            callback(error);
        }
        None
    }
}
