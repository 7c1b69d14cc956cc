//! Per-guild playback state machine.
//!
//! Every guild gets one actor task that owns its [`GuildState`]. All
//! mutations (queue edits, connection changes, advancing) arrive as
//! [`GuildCommand`]s on that actor's mailbox and are handled one at a time,
//! so two triggers racing for the same guild can never both pop a track.
//! Guilds never share an actor and run fully in parallel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::connection::ConnectionManager;
use crate::audio::notice::{Announcer, Notice};
use crate::audio::retry::RetryPolicy;
use crate::audio::state::{GuildSnapshot, GuildState, PlaybackPhase, Track};
use crate::audio::transport::{ConnectionHandle, PlaybackCallback};
use crate::error::{FinalFailure, MusicError, MusicResult, ResolveError};
use crate::sources::{ResolvedStream, TrackResolver};

/// Result of an append request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub added: usize,
    pub queue_len: usize,
    /// Some tracks were dropped because the queue hit capacity.
    pub truncated: bool,
}

/// What an idle check did to a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    Kept,
    /// Connection was idle past the timeout and has been torn down.
    Disconnected,
    /// Guild had no connection and nothing queued; its actor was discarded.
    Pruned,
}

enum GuildCommand {
    Connect {
        channel_id: ChannelId,
        reply: oneshot::Sender<MusicResult<ConnectionHandle>>,
    },
    Enqueue {
        tracks: Vec<Track>,
        announcer: Option<Arc<dyn Announcer>>,
        reply: oneshot::Sender<MusicResult<Appended>>,
    },
    Advance,
    Skip {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        /// User-initiated reads count as activity.
        touch: bool,
        reply: oneshot::Sender<GuildSnapshot>,
    },
    RemoveAt {
        position: usize,
        reply: oneshot::Sender<Option<Track>>,
    },
    Clear {
        reply: oneshot::Sender<bool>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    VoiceLost {
        left: Option<ChannelId>,
    },
    ChannelEmptied,
    ReapIfIdle {
        idle_timeout: Duration,
        reply: oneshot::Sender<ReapOutcome>,
    },
    EndPing {
        reply: oneshot::Sender<bool>,
    },
    BulkStarted,
    BulkFinished,
    StreamResolved {
        generation: u64,
        track: Track,
        result: Result<ResolvedStream, FinalFailure<ResolveError>>,
    },
    PlaybackFinished {
        generation: u64,
        error: Option<String>,
    },
}

#[derive(Clone)]
struct GuildHandle {
    id: u64,
    tx: flume::Sender<GuildCommand>,
}

struct Shared {
    guilds: DashMap<GuildId, GuildHandle>,
    connections: ConnectionManager,
    resolver: Arc<dyn TrackResolver>,
    retry: RetryPolicy,
    max_queue_size: usize,
    next_actor_id: AtomicU64,
}

/// Entry point for everything that touches a guild's playback.
///
/// Cheap to clone; all clones drive the same arena of guild actors.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    shared: Arc<Shared>,
}

impl PlaybackCoordinator {
    pub fn new(
        connections: ConnectionManager,
        resolver: Arc<dyn TrackResolver>,
        retry: RetryPolicy,
        max_queue_size: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                guilds: DashMap::new(),
                connections,
                resolver,
                retry,
                max_queue_size,
                next_actor_id: AtomicU64::new(1),
            }),
        }
    }

    /// Makes sure the bot is in `channel_id`, creating the guild's state if needed.
    pub async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<ConnectionHandle> {
        self.request(guild_id, true, |reply| GuildCommand::Connect { channel_id, reply })
            .await
            .unwrap_or(Err(MusicError::Interrupted))
    }

    /// Appends tracks to the tail of the queue. Starts playback if the guild
    /// is idle with a live connection. `announcer`, when given, becomes the
    /// place this guild's notices go from now on.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        tracks: Vec<Track>,
        announcer: Option<Arc<dyn Announcer>>,
    ) -> MusicResult<Appended> {
        self.request(guild_id, true, |reply| GuildCommand::Enqueue {
            tracks: tracks.clone(),
            announcer: announcer.clone(),
            reply,
        })
        .await
        .unwrap_or(Err(MusicError::Interrupted))
    }

    /// Asks the guild to play its next track if nothing is playing.
    pub fn advance(&self, guild_id: GuildId) {
        self.post(guild_id, GuildCommand::Advance);
    }

    /// Ends the current playback; its completion advances the queue exactly
    /// once. Returns false when nothing was playing.
    pub async fn skip(&self, guild_id: GuildId) -> bool {
        self.request_existing(guild_id, |reply| GuildCommand::Skip { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> GuildSnapshot {
        self.request_existing(guild_id, |reply| GuildCommand::Snapshot {
            touch: false,
            reply,
        })
        .await
        .unwrap_or_default()
    }

    /// Like [`snapshot`](Self::snapshot), but for a user looking at the
    /// queue, so it also refreshes the guild's activity.
    pub async fn list_queue(&self, guild_id: GuildId) -> GuildSnapshot {
        self.request_existing(guild_id, |reply| GuildCommand::Snapshot { touch: true, reply })
            .await
            .unwrap_or_default()
    }

    /// Removes the track at 1-based `position`; `None` if out of range.
    pub async fn remove_at(&self, guild_id: GuildId, position: usize) -> Option<Track> {
        self.request_existing(guild_id, |reply| GuildCommand::RemoveAt { position, reply })
            .await
            .flatten()
    }

    pub async fn clear(&self, guild_id: GuildId) -> bool {
        self.request_existing(guild_id, |reply| GuildCommand::Clear { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn pause(&self, guild_id: GuildId) -> bool {
        self.request_existing(guild_id, |reply| GuildCommand::Pause { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn resume(&self, guild_id: GuildId) -> bool {
        self.request_existing(guild_id, |reply| GuildCommand::Resume { reply })
            .await
            .unwrap_or(false)
    }

    /// Stops playback, leaves voice and discards the guild's state.
    /// Returns false if there was nothing to stop.
    pub async fn stop(&self, guild_id: GuildId) -> bool {
        self.request_existing(guild_id, |reply| GuildCommand::Stop { reply })
            .await
            .unwrap_or(false)
    }

    /// The bot was removed from voice by someone else. `left` is the
    /// channel the gateway says it left, when known. The guild is only torn
    /// down if that still describes its live connection.
    pub fn voice_lost(&self, guild_id: GuildId, left: Option<ChannelId>) {
        self.post(guild_id, GuildCommand::VoiceLost { left });
    }

    /// Every human left the bot's channel.
    pub fn channel_emptied(&self, guild_id: GuildId) {
        self.post(guild_id, GuildCommand::ChannelEmptied);
    }

    pub async fn reap_if_idle(&self, guild_id: GuildId, idle_timeout: Duration) -> ReapOutcome {
        self.request_existing(guild_id, |reply| GuildCommand::ReapIfIdle {
            idle_timeout,
            reply,
        })
        .await
        .unwrap_or(ReapOutcome::Kept)
    }

    /// Joins `channel_id` and leaves again after `hold`, to check that voice
    /// works. Refused while the guild already has a session. The returned
    /// task yields whether the bot left; it stays if something got queued
    /// during the hold.
    pub async fn ping_voice(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        hold: Duration,
    ) -> MusicResult<JoinHandle<bool>> {
        if self.is_active(guild_id) {
            return Err(MusicError::VoiceBusy);
        }

        if let Err(e) = self.connect(guild_id, channel_id).await {
            self.end_ping(guild_id).await;
            return Err(e);
        }

        let coordinator = self.clone();
        Ok(tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            coordinator.end_ping(guild_id).await
        }))
    }

    async fn end_ping(&self, guild_id: GuildId) -> bool {
        self.request_existing(guild_id, |reply| GuildCommand::EndPing { reply })
            .await
            .unwrap_or(false)
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.shared.guilds.iter().map(|entry| *entry.key()).collect()
    }

    pub fn is_active(&self, guild_id: GuildId) -> bool {
        self.shared.guilds.contains_key(&guild_id)
    }

    /// Marks a bulk expansion as running for the guild's current state.
    /// `None` if the guild has no state yet.
    pub fn bulk_session(&self, guild_id: GuildId) -> Option<BulkSession> {
        let handle = self.shared.guilds.get(&guild_id)?.value().clone();
        handle.tx.send(GuildCommand::BulkStarted).ok()?;
        Some(BulkSession { guild_id, handle })
    }

    fn post(&self, guild_id: GuildId, command: GuildCommand) {
        let handle = match self.shared.guilds.get(&guild_id) {
            Some(entry) => entry.value().clone(),
            None => {
                debug!("No player for guild {}, dropping message", guild_id);
                return;
            }
        };
        if handle.tx.send(command).is_err() {
            self.forget_actor(guild_id, handle.id);
        }
    }

    async fn request_existing<T>(
        &self,
        guild_id: GuildId,
        make: impl Fn(oneshot::Sender<T>) -> GuildCommand,
    ) -> Option<T> {
        self.request(guild_id, false, make).await
    }

    /// Sends a command and waits for the reply. If the actor went away
    /// between lookup and reply, its stale entry is dropped and the request
    /// is tried once more.
    async fn request<T>(
        &self,
        guild_id: GuildId,
        create: bool,
        make: impl Fn(oneshot::Sender<T>) -> GuildCommand,
    ) -> Option<T> {
        for _ in 0..2 {
            let handle = if create {
                self.handle_or_spawn(guild_id)
            } else {
                self.shared.guilds.get(&guild_id)?.value().clone()
            };

            let (reply_tx, reply_rx) = oneshot::channel();
            if handle.tx.send(make(reply_tx)).is_ok() {
                if let Ok(value) = reply_rx.await {
                    return Some(value);
                }
            }
            self.forget_actor(guild_id, handle.id);
        }
        None
    }

    fn handle_or_spawn(&self, guild_id: GuildId) -> GuildHandle {
        self.shared
            .guilds
            .entry(guild_id)
            .or_insert_with(|| self.spawn_actor(guild_id))
            .value()
            .clone()
    }

    fn spawn_actor(&self, guild_id: GuildId) -> GuildHandle {
        let (tx, rx) = flume::unbounded();
        let id = self.shared.next_actor_id.fetch_add(1, Ordering::Relaxed);
        let actor = GuildActor {
            guild_id,
            actor_id: id,
            state: GuildState::new(self.shared.max_queue_size),
            shared: self.shared.clone(),
            tx: tx.clone(),
        };
        tokio::spawn(actor.run(rx));
        debug!("Spawned player for guild {}", guild_id);
        GuildHandle { id, tx }
    }

    fn forget_actor(&self, guild_id: GuildId, actor_id: u64) {
        self.shared
            .guilds
            .remove_if(&guild_id, |_, handle| handle.id == actor_id);
    }
}

/// Keeps a guild's bulk-enqueue-in-flight flag raised while alive.
///
/// Bound to the guild state that existed when it was opened: once that
/// state is torn down, appends through the session fail instead of leaking
/// into a fresh one.
pub struct BulkSession {
    guild_id: GuildId,
    handle: GuildHandle,
}

impl BulkSession {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// `None` once the guild state this session belongs to is gone.
    pub async fn append(&self, tracks: Vec<Track>) -> Option<MusicResult<Appended>> {
        let (reply, rx) = oneshot::channel();
        self.handle
            .tx
            .send(GuildCommand::Enqueue {
                tracks,
                announcer: None,
                reply,
            })
            .ok()?;
        rx.await.ok()
    }
}

impl Drop for BulkSession {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(GuildCommand::BulkFinished);
    }
}

enum Flow {
    Continue,
    Exit,
}

struct GuildActor {
    guild_id: GuildId,
    actor_id: u64,
    state: GuildState,
    shared: Arc<Shared>,
    tx: flume::Sender<GuildCommand>,
}

impl GuildActor {
    async fn run(mut self, rx: flume::Receiver<GuildCommand>) {
        while let Ok(command) = rx.recv_async().await {
            if let Flow::Exit = self.handle(command).await {
                break;
            }
        }

        let actor_id = self.actor_id;
        self.shared
            .guilds
            .remove_if(&self.guild_id, |_, handle| handle.id == actor_id);
        debug!("Player for guild {} shut down", self.guild_id);
    }

    async fn handle(&mut self, command: GuildCommand) -> Flow {
        match command {
            GuildCommand::Connect { channel_id, reply } => {
                let result = self.connect(channel_id).await;
                let _ = reply.send(result);
            }
            GuildCommand::Enqueue {
                tracks,
                announcer,
                reply,
            } => {
                let _ = reply.send(self.enqueue(tracks, announcer));
                self.advance();
            }
            GuildCommand::Advance => self.advance(),
            GuildCommand::Skip { reply } => {
                let skipped = self.skip().await;
                let _ = reply.send(skipped);
            }
            GuildCommand::Snapshot { touch, reply } => {
                if touch {
                    self.state.touch();
                }
                let _ = reply.send(self.state.snapshot());
            }
            GuildCommand::RemoveAt { position, reply } => {
                self.state.touch();
                let _ = reply.send(self.state.queue.remove_at(position));
            }
            GuildCommand::Clear { reply } => {
                self.state.touch();
                let _ = reply.send(self.state.queue.clear());
            }
            GuildCommand::Pause { reply } => {
                let paused = self.pause_or_resume(true).await;
                let _ = reply.send(paused);
            }
            GuildCommand::Resume { reply } => {
                let resumed = self.pause_or_resume(false).await;
                let _ = reply.send(resumed);
            }
            GuildCommand::Stop { reply } => {
                let had_anything = self.state.is_connected()
                    || !self.state.queue.is_empty()
                    || self.state.phase != PlaybackPhase::Idle;
                self.teardown(false).await;
                let _ = reply.send(had_anything);
                return Flow::Exit;
            }
            GuildCommand::VoiceLost { left } => {
                if !self.voice_really_lost(left).await {
                    return Flow::Continue;
                }
                info!("Voice connection in guild {} was closed externally", self.guild_id);
                self.teardown(true).await;
                return Flow::Exit;
            }
            GuildCommand::ChannelEmptied => {
                info!("👋 Left alone in guild {}, leaving", self.guild_id);
                self.teardown(false).await;
                return Flow::Exit;
            }
            GuildCommand::ReapIfIdle {
                idle_timeout,
                reply,
            } => {
                let outcome = self.reap_if_idle(idle_timeout).await;
                let _ = reply.send(outcome);
                if outcome != ReapOutcome::Kept {
                    return Flow::Exit;
                }
            }
            GuildCommand::EndPing { reply } => {
                let unused = self.state.queue.is_empty()
                    && self.state.phase == PlaybackPhase::Idle
                    && !self.state.bulk_enqueue_in_flight();
                if unused {
                    debug!("Voice check in guild {} done, leaving", self.guild_id);
                    self.teardown(false).await;
                }
                let _ = reply.send(unused);
                if unused {
                    return Flow::Exit;
                }
            }
            GuildCommand::BulkStarted => self.state.bulk_started(),
            GuildCommand::BulkFinished => {
                self.state.bulk_finished();
                self.state.touch();
            }
            GuildCommand::StreamResolved {
                generation,
                track,
                result,
            } => self.on_stream_resolved(generation, track, result).await,
            GuildCommand::PlaybackFinished { generation, error } => {
                self.on_playback_finished(generation, error)
            }
        }
        Flow::Continue
    }

    async fn connect(&mut self, channel_id: ChannelId) -> MusicResult<ConnectionHandle> {
        self.state.touch();
        let was_idle = self.state.phase == PlaybackPhase::Idle;
        if was_idle {
            self.state.phase = PlaybackPhase::Connecting;
        }

        let result = self
            .shared
            .connections
            .ensure_connected(&mut self.state.connection, self.guild_id, channel_id)
            .await;

        if was_idle {
            self.state.phase = PlaybackPhase::Idle;
        }
        Ok(result?)
    }

    fn enqueue(
        &mut self,
        tracks: Vec<Track>,
        announcer: Option<Arc<dyn Announcer>>,
    ) -> MusicResult<Appended> {
        self.state.touch();
        if announcer.is_some() {
            self.state.announcer = announcer;
        }

        let requested = tracks.len();
        let mut added = 0;
        for track in tracks {
            match self.state.queue.append(track) {
                Ok(_) => added += 1,
                Err(e) if added == 0 => return Err(e),
                Err(_) => break,
            }
        }

        Ok(Appended {
            added,
            queue_len: self.state.queue.len(),
            truncated: added < requested,
        })
    }

    /// Pops the head track and starts resolving it, unless something is
    /// already resolving or playing. An empty queue just leaves the guild
    /// idle; disconnecting is the reaper's job.
    fn advance(&mut self) {
        if self.state.phase != PlaybackPhase::Idle {
            return;
        }
        self.state.touch();

        if !self.state.is_connected() {
            debug!("Guild {} has no voice connection, not advancing", self.guild_id);
            return;
        }

        let Some(track) = self.state.queue.pop_front() else {
            debug!("Queue empty for guild {}, going idle", self.guild_id);
            return;
        };

        self.state.generation += 1;
        self.state.phase = PlaybackPhase::Resolving;
        self.state.current = Some(track.clone());

        let generation = self.state.generation;
        let resolver = self.shared.resolver.clone();
        let retry = self.shared.retry.clone();
        let tx = self.tx.clone();

        debug!("Resolving {} for guild {}", track.title, self.guild_id);
        tokio::spawn(async move {
            let locator = track.locator.clone();
            let result = retry
                .run_with_backoff(|| resolver.resolve_single(&locator))
                .await;
            let _ = tx.send(GuildCommand::StreamResolved {
                generation,
                track,
                result,
            });
        });
    }

    async fn on_stream_resolved(
        &mut self,
        generation: u64,
        track: Track,
        result: Result<ResolvedStream, FinalFailure<ResolveError>>,
    ) {
        if generation != self.state.generation || self.state.phase != PlaybackPhase::Resolving {
            debug!("Ignoring stale resolution of {}", track.title);
            return;
        }

        let stream = match result {
            Ok(stream) => stream,
            Err(failure) => {
                warn!("❌ Could not resolve {}: {}", track.title, failure);
                self.skip_failed(track).await;
                return;
            }
        };

        let Some(handle) = self.state.connection else {
            warn!(
                "Voice connection for guild {} vanished while resolving {}",
                self.guild_id, track.title
            );
            self.state.phase = PlaybackPhase::Idle;
            self.state.current = None;
            return;
        };

        let tx = self.tx.clone();
        let on_complete: PlaybackCallback = Box::new(move |error| {
            let _ = tx.send(GuildCommand::PlaybackFinished { generation, error });
        });

        match self
            .shared
            .connections
            .transport()
            .play(&handle, &stream.stream_url, on_complete)
            .await
        {
            Ok(()) => {
                self.state.phase = PlaybackPhase::Playing;
                self.state.touch();
                info!("🎵 Now playing in guild {}: {}", self.guild_id, track.title);
                self.announce(Notice::NowPlaying { title: track.title }).await;
            }
            Err(e) => {
                warn!("❌ Transport refused to play {}: {}", track.title, e);
                self.skip_failed(track).await;
            }
        }
    }

    /// A disconnect event can arrive after the connection it describes was
    /// already replaced, e.g. by a session reset or a stop followed by a new
    /// play. Only a dead handle in the channel that was left counts.
    async fn voice_really_lost(&self, left: Option<ChannelId>) -> bool {
        let Some(handle) = self.state.connection else {
            debug!("Guild {} has no voice connection, ignoring disconnect", self.guild_id);
            return false;
        };
        if left.is_some_and(|channel| channel != handle.channel_id) {
            debug!(
                "Guild {} left {:?} but is connected to {}, ignoring",
                self.guild_id, left, handle.channel_id
            );
            return false;
        }
        if self.shared.connections.transport().is_connected(&handle).await {
            debug!(
                "Voice connection in guild {} is still live, ignoring stale disconnect",
                self.guild_id
            );
            return false;
        }
        true
    }

    /// Skip-and-continue after a track could not be started.
    async fn skip_failed(&mut self, track: Track) {
        self.announce(Notice::Skipping { title: track.title }).await;
        self.state.phase = PlaybackPhase::Idle;
        self.state.current = None;

        if self.state.queue.is_empty() {
            self.state.cleanup();
        } else {
            self.advance();
        }
    }

    fn on_playback_finished(&mut self, generation: u64, error: Option<String>) {
        if generation != self.state.generation || self.state.phase != PlaybackPhase::Playing {
            debug!("Ignoring stale completion in guild {}", self.guild_id);
            return;
        }

        if let Some(error) = error {
            warn!("Playback in guild {} ended with an error: {}", self.guild_id, error);
        }

        self.state.phase = PlaybackPhase::Idle;
        self.state.current = None;
        self.advance();
    }

    async fn skip(&mut self) -> bool {
        self.state.touch();
        if self.state.phase != PlaybackPhase::Playing {
            return false;
        }
        let Some(handle) = self.state.connection else {
            return false;
        };

        if let Err(e) = self.shared.connections.transport().stop(&handle).await {
            // The completion callback may never fire now, so advance by hand.
            warn!("Stopping track in guild {} failed: {}", self.guild_id, e);
            self.state.generation += 1;
            self.state.phase = PlaybackPhase::Idle;
            self.state.current = None;
            self.advance();
        }
        true
    }

    async fn pause_or_resume(&mut self, pause: bool) -> bool {
        self.state.touch();
        let Some(handle) = self.state.connection else {
            return false;
        };
        if self.state.phase != PlaybackPhase::Playing {
            return false;
        }

        let transport = self.shared.connections.transport();
        let result = if pause {
            transport.pause(&handle).await
        } else {
            transport.resume(&handle).await
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Pause/resume in guild {} failed: {}", self.guild_id, e);
                false
            }
        }
    }

    async fn reap_if_idle(&mut self, idle_timeout: Duration) -> ReapOutcome {
        if self.state.bulk_enqueue_in_flight()
            || matches!(
                self.state.phase,
                PlaybackPhase::Resolving | PlaybackPhase::Connecting
            )
        {
            return ReapOutcome::Kept;
        }

        let idle_for = self.state.last_activity.elapsed();
        if idle_for <= idle_timeout {
            return ReapOutcome::Kept;
        }

        if !self.state.is_connected() {
            if self.state.queue.is_empty() {
                debug!("Pruning idle player for guild {}", self.guild_id);
                return ReapOutcome::Pruned;
            }
            return ReapOutcome::Kept;
        }

        if self
            .shared
            .connections
            .is_playing(self.state.connection.as_ref())
            .await
        {
            return ReapOutcome::Kept;
        }

        info!(
            "💤 Guild {} idle for {}s, disconnecting",
            self.guild_id,
            idle_for.as_secs()
        );
        self.teardown(false).await;
        ReapOutcome::Disconnected
    }

    /// Invalidates pending completions, leaves voice and clears the queue.
    async fn teardown(&mut self, force: bool) {
        self.state.generation += 1;

        if self.state.phase == PlaybackPhase::Playing {
            if let Some(handle) = self.state.connection {
                if let Err(e) = self.shared.connections.transport().stop(&handle).await {
                    debug!("Ignoring stop error during teardown: {}", e);
                }
            }
        }

        self.shared
            .connections
            .disconnect(&mut self.state.connection, force)
            .await;
        self.state.cleanup();
    }

    async fn announce(&self, notice: Notice) {
        if let Some(announcer) = &self.state.announcer {
            announcer.announce(notice).await;
        }
    }
}
