//! In-memory collaborators for driving the playback core without Discord
//! or yt-dlp.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};

use bonebot::audio::connection::ConnectionManager;
use bonebot::audio::coordinator::PlaybackCoordinator;
use bonebot::audio::notice::{Announcer, Notice};
use bonebot::audio::retry::RetryPolicy;
use bonebot::audio::state::Track;
use bonebot::audio::transport::{
    ConnectionHandle, PlaybackCallback, TransportError, VoiceTransport,
};
use bonebot::error::ResolveError;
use bonebot::sources::{PageSpec, PlaylistEntry, ResolvedStream, TrackResolver};

pub const GUILD: GuildId = GuildId::new(1);
pub const OTHER_GUILD: GuildId = GuildId::new(2);
pub const CHANNEL: ChannelId = ChannelId::new(10);
pub const OTHER_CHANNEL: ChannelId = ChannelId::new(11);

#[derive(Default)]
struct TransportInner {
    connected: HashMap<GuildId, ChannelId>,
    playing: HashMap<GuildId, PlaybackCallback>,
    paused: HashSet<GuildId>,
    plays: Vec<(GuildId, String)>,
    connect_failures: VecDeque<TransportError>,
    connect_calls: usize,
    moves: usize,
    disconnects: Vec<(GuildId, bool)>,
    refuse_play: HashSet<String>,
    fail_stop: bool,
}

/// Voice transport that keeps everything in memory. Tracks only end when a
/// test says so (or when they are stopped).
#[derive(Default)]
pub struct FakeTransport {
    inner: Mutex<TransportInner>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `connect` calls fail with these errors, in order.
    pub fn fail_connects(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.inner.lock().connect_failures.extend(errors);
    }

    pub fn refuse_to_play(&self, stream_url: &str) {
        self.inner.lock().refuse_play.insert(stream_url.to_string());
    }

    pub fn fail_stops(&self) {
        self.inner.lock().fail_stop = true;
    }

    /// Drops the connection as if Discord closed it.
    pub fn drop_connection(&self, guild_id: GuildId) {
        let mut inner = self.inner.lock();
        inner.connected.remove(&guild_id);
        inner.playing.remove(&guild_id);
    }

    /// Ends the current track naturally. Returns false if nothing was playing.
    pub fn finish_current(&self, guild_id: GuildId) -> bool {
        let callback = self.inner.lock().playing.remove(&guild_id);
        match callback {
            Some(callback) => {
                callback(None);
                true
            }
            None => false,
        }
    }

    pub fn fail_current(&self, guild_id: GuildId, error: &str) -> bool {
        let callback = self.inner.lock().playing.remove(&guild_id);
        match callback {
            Some(callback) => {
                callback(Some(error.to_string()));
                true
            }
            None => false,
        }
    }

    /// Every stream URL handed to `play`, in order.
    pub fn plays(&self, guild_id: GuildId) -> Vec<String> {
        self.inner
            .lock()
            .plays
            .iter()
            .filter(|(guild, _)| *guild == guild_id)
            .map(|(_, url)| url.clone())
            .collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.lock().connect_calls
    }

    pub fn moves(&self) -> usize {
        self.inner.lock().moves
    }

    pub fn disconnects(&self) -> Vec<(GuildId, bool)> {
        self.inner.lock().disconnects.clone()
    }

    pub fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.inner.lock().connected.get(&guild_id).copied()
    }

    pub fn is_paused(&self, guild_id: GuildId) -> bool {
        self.inner.lock().paused.contains(&guild_id)
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ConnectionHandle, TransportError> {
        let mut inner = self.inner.lock();
        inner.connect_calls += 1;
        if let Some(error) = inner.connect_failures.pop_front() {
            return Err(error);
        }
        inner.connected.insert(guild_id, channel_id);
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
        let mut inner = self.inner.lock();
        inner.moves += 1;
        inner.connected.insert(handle.guild_id, channel_id);
        Ok(ConnectionHandle {
            guild_id: handle.guild_id,
            channel_id,
        })
    }

    async fn disconnect(&self, handle: &ConnectionHandle, force: bool) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.disconnects.push((handle.guild_id, force));
        inner.playing.remove(&handle.guild_id);
        inner.paused.remove(&handle.guild_id);
        match inner.connected.remove(&handle.guild_id) {
            Some(_) => Ok(()),
            None => Err(TransportError::NotConnected),
        }
    }

    async fn play(
        &self,
        handle: &ConnectionHandle,
        stream_url: &str,
        on_complete: PlaybackCallback,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.connected.contains_key(&handle.guild_id) {
            return Err(TransportError::NotConnected);
        }
        if inner.refuse_play.contains(stream_url) {
            return Err(TransportError::Playback(format!("cannot decode {stream_url}")));
        }
        inner.plays.push((handle.guild_id, stream_url.to_string()));
        inner.paused.remove(&handle.guild_id);
        inner.playing.insert(handle.guild_id, on_complete);
        Ok(())
    }

    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.fail_stop {
                return Err(TransportError::Playback("stop failed".to_string()));
            }
            inner.paused.remove(&handle.guild_id);
            inner.playing.remove(&handle.guild_id)
        };
        if let Some(callback) = callback {
            callback(None);
        }
        Ok(())
    }

    async fn pause(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.inner.lock().paused.insert(handle.guild_id);
        Ok(())
    }

    async fn resume(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.inner.lock().paused.remove(&handle.guild_id);
        Ok(())
    }

    async fn is_connected(&self, handle: &ConnectionHandle) -> bool {
        self.inner
            .lock()
            .connected
            .get(&handle.guild_id)
            .is_some_and(|channel| *channel == handle.channel_id)
    }

    async fn is_playing(&self, handle: &ConnectionHandle) -> bool {
        let inner = self.inner.lock();
        inner.playing.contains_key(&handle.guild_id) && !inner.paused.contains(&handle.guild_id)
    }
}

/// Resolves `locator` to `stream:<locator>` unless told otherwise.
#[derive(Default)]
pub struct FakeResolver {
    failing: Mutex<HashSet<String>>,
    playlists: Mutex<HashMap<String, Vec<PlaylistEntry>>>,
    delay: Mutex<Option<Duration>>,
    resolve_calls: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, locator: &str) {
        self.failing.lock().insert(locator.to_string());
    }

    /// Every resolution sleeps this long first.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Registers a playlist; entries are numbered from 1 like yt-dlp's.
    pub fn add_playlist(&self, locator: &str, entries: Vec<PlaylistEntry>) {
        self.playlists.lock().insert(locator.to_string(), entries);
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

pub fn stream_for(locator: &str) -> String {
    format!("stream:{locator}")
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve_single(&self, locator: &str) -> Result<ResolvedStream, ResolveError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(locator) {
            return Err(ResolveError::NoStream {
                locator: locator.to_string(),
            });
        }
        Ok(ResolvedStream {
            title: format!("Title of {locator}"),
            stream_url: stream_for(locator),
        })
    }

    async fn resolve_search(&self, query: &str) -> Result<Track, ResolveError> {
        if self.failing.lock().contains(query) {
            return Err(ResolveError::NoResults {
                query: query.to_string(),
            });
        }
        Ok(Track::new(query, format!("search:{query}")))
    }

    async fn resolve_playlist_page(
        &self,
        locator: &str,
        page: PageSpec,
    ) -> Result<Vec<PlaylistEntry>, ResolveError> {
        let entries = self
            .playlists
            .lock()
            .get(locator)
            .cloned()
            .ok_or_else(|| ResolveError::NoData {
                locator: locator.to_string(),
            })?;
        let start = page.start.saturating_sub(1);
        let end = page.end.unwrap_or(entries.len()).min(entries.len());
        Ok(entries.get(start..end).map(<[_]>::to_vec).unwrap_or_default())
    }
}

/// Collects every notice it is given.
#[derive(Default)]
pub struct RecordingAnnouncer {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Short backoff so failing resolutions give up quickly in paused-time tests.
pub fn quick_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(100), 2)
}

pub fn coordinator(transport: Arc<FakeTransport>, resolver: Arc<FakeResolver>) -> PlaybackCoordinator {
    coordinator_with_capacity(transport, resolver, 1000)
}

pub fn coordinator_with_capacity(
    transport: Arc<FakeTransport>,
    resolver: Arc<FakeResolver>,
    max_queue_size: usize,
) -> PlaybackCoordinator {
    let connections = ConnectionManager::new(transport, Duration::from_millis(500));
    PlaybackCoordinator::new(connections, resolver, quick_retry(), max_queue_size)
}

pub fn track(name: &str) -> Track {
    Track::new(name, name)
}

pub fn tracks(names: &[&str]) -> Vec<Track> {
    names.iter().map(|name| track(name)).collect()
}

pub fn entry(name: &str) -> PlaylistEntry {
    PlaylistEntry {
        title: name.to_string(),
        locator: name.to_string(),
        original_url: None,
    }
}

/// Polls `condition` until it holds, yielding to other tasks in between.
/// Panics after a generous number of rounds.
pub async fn eventually<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}
