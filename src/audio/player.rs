use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audio::bulk::{playlist_pages, search_pages, BulkEnqueuer, BulkReport, PageFuture};
use crate::audio::coordinator::PlaybackCoordinator;
use crate::audio::notice::Announcer;
use crate::audio::queue::QueuePage;
use crate::audio::state::Track;
use crate::error::{MusicError, MusicResult};
use crate::sources::{classify, CatalogResolver, CollectionKind, Request, TrackResolver};

/// How long `/pingvc` stays in voice.
pub const PING_VOICE_HOLD: Duration = Duration::from_secs(2);

/// A `/play` call, as the command layer hands it over.
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub query: String,
    pub announcer: Option<Arc<dyn Announcer>>,
}

/// What `/play` did.
pub struct PlayReply {
    pub track: Track,
    /// Where the track came from, when it's worth saying.
    pub via: Option<&'static str>,
    pub queue_len: usize,
    /// Background expansion of the rest of a playlist or collection.
    pub expansion: Option<JoinHandle<BulkReport>>,
    /// The track stays queued even if joining voice failed.
    pub connect_error: Option<MusicError>,
}

impl PlayReply {
    pub fn summary(&self) -> String {
        let mut lines = vec![match self.via {
            Some(via) => format!("Added to queue: {} ({})", self.track.title, via),
            None => format!("Added to queue: {}", self.track.title),
        }];
        if self.expansion.is_some() {
            lines.push("Fetching the rest of the collection...".to_string());
        }
        if let Some(e) = &self.connect_error {
            lines.push(e.to_string());
        }
        lines.join("\n")
    }
}

/// First track plus whatever should be expanded behind it.
struct Resolved {
    track: Track,
    via: Option<&'static str>,
    rest: Option<(String, Vec<PageFuture>)>,
}

/// The operations the slash commands call.
pub struct MusicPlayer {
    coordinator: PlaybackCoordinator,
    resolver: Arc<dyn TrackResolver>,
    catalog: Option<Arc<dyn CatalogResolver>>,
    bulk: BulkEnqueuer,
    page_size: usize,
}

impl MusicPlayer {
    pub fn new(
        coordinator: PlaybackCoordinator,
        resolver: Arc<dyn TrackResolver>,
        catalog: Option<Arc<dyn CatalogResolver>>,
        page_size: usize,
    ) -> Self {
        Self {
            bulk: BulkEnqueuer::new(coordinator.clone()),
            coordinator,
            resolver,
            catalog,
            page_size,
        }
    }

    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    /// Resolves and queues the first track before touching voice, then
    /// joins the caller's channel and starts playback. The rest of a
    /// playlist or collection is expanded in the background.
    pub async fn play(&self, request: PlayRequest) -> MusicResult<PlayReply> {
        let PlayRequest {
            guild_id,
            channel_id,
            user_id,
            query,
            announcer,
        } = request;

        let resolved = self.resolve_first(&query).await?;
        let track = resolved.track.with_requested_by(user_id);

        let appended = self
            .coordinator
            .enqueue(guild_id, vec![track.clone()], announcer.clone())
            .await?;
        info!("➕ {} queued in guild {} at #{}", track.title, guild_id, appended.queue_len);

        let expansion = resolved.rest.and_then(|(source, pages)| {
            self.bulk.spawn(guild_id, source, pages, announcer.clone())
        });

        let connect_error = match self.coordinator.connect(guild_id, channel_id).await {
            Ok(_) => {
                self.coordinator.advance(guild_id);
                None
            }
            Err(e) => {
                warn!("Could not join voice in guild {}: {}", guild_id, e);
                Some(e)
            }
        };

        Ok(PlayReply {
            track,
            via: resolved.via,
            queue_len: appended.queue_len,
            expansion,
            connect_error,
        })
    }

    async fn resolve_first(&self, query: &str) -> MusicResult<Resolved> {
        match classify(query) {
            Request::UnsupportedSpotify => Err(MusicError::UnsupportedCatalogUrl),
            Request::Spotify { kind, id } => self.resolve_catalog(kind, &id).await,
            Request::SoundCloud { url } => {
                let title = match self.resolver.resolve_single(&url).await {
                    Ok(stream) => stream.title,
                    Err(e) => {
                        warn!("No SoundCloud metadata for {}: {}", url, e);
                        "SoundCloud track".to_string()
                    }
                };
                Ok(Resolved {
                    track: Track::new(title, url),
                    via: Some("SoundCloud"),
                    rest: None,
                })
            }
            Request::YouTube { url, playlist } => {
                let stream = self.resolver.resolve_single(&url).await?;
                let rest = playlist.then(|| {
                    (
                        "YouTube playlist".to_string(),
                        playlist_pages(self.resolver.clone(), &url),
                    )
                });
                Ok(Resolved {
                    track: Track::new(stream.title, url),
                    via: None,
                    rest,
                })
            }
            Request::Search { query } => Ok(Resolved {
                track: self.resolver.resolve_search(&query).await?,
                via: None,
                rest: None,
            }),
        }
    }

    async fn resolve_catalog(&self, kind: CollectionKind, id: &str) -> MusicResult<Resolved> {
        let catalog = self.catalog.as_ref().ok_or(MusicError::CatalogUnavailable)?;

        let mut items = match kind {
            CollectionKind::Track => vec![catalog.resolve_track_meta(id).await?],
            _ => catalog.resolve_collection_items(kind, id).await?,
        };
        if items.is_empty() {
            return Err(MusicError::EmptyResult(format!(
                "No playable items found in that Spotify {kind}."
            )));
        }

        let first = items.remove(0);
        let track = self.resolver.resolve_search(&first.search_query()).await?;
        info!("🎧 Spotify {} → {}", first.display_name(), track.title);

        let rest = (!items.is_empty()).then(|| {
            let queries = items.iter().map(|item| item.search_query()).collect();
            (
                format!("Spotify {kind}"),
                search_pages(self.resolver.clone(), queries),
            )
        });
        Ok(Resolved {
            track,
            via: Some("via Spotify"),
            rest,
        })
    }

    pub async fn skip(&self, guild_id: GuildId) -> bool {
        self.coordinator.skip(guild_id).await
    }

    /// Now-playing track and one page of what's queued after it.
    pub async fn queue(&self, guild_id: GuildId, page: usize) -> (Option<Track>, QueuePage) {
        let snapshot = self.coordinator.list_queue(guild_id).await;
        (
            snapshot.now_playing,
            QueuePage::from_snapshot(&snapshot.tracks, page, self.page_size),
        )
    }

    pub async fn remove(&self, guild_id: GuildId, position: usize) -> Option<Track> {
        self.coordinator.remove_at(guild_id, position).await
    }

    pub async fn clear(&self, guild_id: GuildId) -> bool {
        self.coordinator.clear(guild_id).await
    }

    pub async fn pause(&self, guild_id: GuildId) -> bool {
        self.coordinator.pause(guild_id).await
    }

    pub async fn resume(&self, guild_id: GuildId) -> bool {
        self.coordinator.resume(guild_id).await
    }

    pub async fn stop(&self, guild_id: GuildId) -> bool {
        self.coordinator.stop(guild_id).await
    }

    /// Joins `channel_id` and leaves after [`PING_VOICE_HOLD`].
    pub async fn ping_voice(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<JoinHandle<bool>> {
        self.coordinator
            .ping_voice(guild_id, channel_id, PING_VOICE_HOLD)
            .await
    }

    pub fn voice_disconnected(&self, guild_id: GuildId, left: Option<ChannelId>) {
        self.coordinator.voice_lost(guild_id, left);
    }

    pub fn channel_emptied(&self, guild_id: GuildId) {
        self.coordinator.channel_emptied(guild_id);
    }
}
