use std::sync::Arc;

use serenity::model::id::UserId;
use tokio::time::Instant;

use crate::audio::{notice::Announcer, queue::TrackQueue, transport::ConnectionHandle};

/// A queued track. The locator is resolved to a stream URL only when the
/// track reaches the head of the queue; stream URLs expire, locators don't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub locator: String,
    pub requested_by: Option<UserId>,
}

impl Track {
    pub fn new(title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: locator.into(),
            requested_by: None,
        }
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }
}

/// Where a guild's playback state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Nothing playing and nothing being fetched.
    Idle,
    Connecting,
    /// Stream URL for the popped head track is being fetched.
    Resolving,
    Playing,
}

/// Per-guild record. Owned by exactly one guild actor, never shared.
pub struct GuildState {
    pub queue: TrackQueue,
    pub connection: Option<ConnectionHandle>,
    pub last_activity: Instant,
    pub phase: PlaybackPhase,
    /// Bumped on every play attempt; completions carrying an older value are stale.
    pub generation: u64,
    /// Title of the track currently resolving or playing.
    pub current: Option<Track>,
    /// Where notices for this guild go (the last command's channel).
    pub announcer: Option<Arc<dyn Announcer>>,
    bulk_in_flight: u32,
}

impl GuildState {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            queue: TrackQueue::new(max_queue_size),
            connection: None,
            last_activity: Instant::now(),
            phase: PlaybackPhase::Idle,
            generation: 0,
            current: None,
            announcer: None,
            bulk_in_flight: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn bulk_enqueue_in_flight(&self) -> bool {
        self.bulk_in_flight > 0
    }

    pub fn bulk_started(&mut self) {
        self.bulk_in_flight += 1;
    }

    pub fn bulk_finished(&mut self) {
        self.bulk_in_flight = self.bulk_in_flight.saturating_sub(1);
    }

    /// Clears everything playback-related except the connection and any
    /// running bulk expansion, and refreshes activity so an idle sweep
    /// doesn't fire right away.
    pub fn cleanup(&mut self) {
        self.queue.clear();
        self.current = None;
        self.phase = PlaybackPhase::Idle;
        self.touch();
    }

    pub fn snapshot(&self) -> GuildSnapshot {
        GuildSnapshot {
            tracks: self.queue.snapshot(),
            phase: self.phase,
            connected: self.connection.is_some(),
            bulk_enqueue_in_flight: self.bulk_enqueue_in_flight(),
            now_playing: self.current.clone(),
        }
    }
}

/// Read-only copy of a guild's state, for display and tests.
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    pub tracks: Vec<Track>,
    pub phase: PlaybackPhase,
    pub connected: bool,
    pub bulk_enqueue_in_flight: bool,
    pub now_playing: Option<Track>,
}

impl Default for GuildSnapshot {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            phase: PlaybackPhase::Idle,
            connected: false,
            bulk_enqueue_in_flight: false,
            now_playing: None,
        }
    }
}
