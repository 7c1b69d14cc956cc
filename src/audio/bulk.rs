//! Background expansion of playlists and catalog collections.
//!
//! Pages are fetched one after another and appended as they arrive, so the
//! first tracks can already be playing while later pages are still loading.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serenity::model::id::GuildId;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::coordinator::{BulkSession, PlaybackCoordinator};
use crate::audio::notice::{Announcer, Notice};
use crate::error::{MusicError, ResolveError};
use crate::sources::{playlist_chunks, PlaylistEntry, TrackResolver};

/// How many catalog searches go into one page.
pub const SEARCH_PAGE_SIZE: usize = 10;

/// One lazily-fetched page. Nothing runs until the expander polls it.
pub type PageFuture = BoxFuture<'static, Result<Vec<PlaylistEntry>, ResolveError>>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkReport {
    pub added: usize,
    /// Entries without a title or locator.
    pub unavailable: usize,
    pub failed_pages: usize,
    /// Expansion ended before the last page (queue full or guild gone).
    pub stopped_early: bool,
}

pub struct BulkEnqueuer {
    coordinator: PlaybackCoordinator,
}

impl BulkEnqueuer {
    pub fn new(coordinator: PlaybackCoordinator) -> Self {
        Self { coordinator }
    }

    /// Starts expanding in the background. `source` names the collection
    /// in notices ("YouTube playlist", "Spotify album"). `None` if the
    /// guild has no state to append to.
    pub fn spawn(
        &self,
        guild_id: GuildId,
        source: String,
        pages: Vec<PageFuture>,
        announcer: Option<Arc<dyn Announcer>>,
    ) -> Option<JoinHandle<BulkReport>> {
        let session = self.coordinator.bulk_session(guild_id)?;
        Some(tokio::spawn(expand(session, source, pages, announcer)))
    }
}

/// Runs every page in order and appends what it finds. The session is
/// dropped on return, which clears the guild's in-flight flag.
pub async fn expand(
    session: BulkSession,
    source: String,
    pages: Vec<PageFuture>,
    announcer: Option<Arc<dyn Announcer>>,
) -> BulkReport {
    let guild_id = session.guild_id();
    let total_pages = pages.len();
    let mut report = BulkReport::default();
    info!("📜 Expanding {} for guild {} ({} pages)", source, guild_id, total_pages);

    for (index, page) in pages.into_iter().enumerate() {
        let entries = match page.await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Page {}/{} of {} failed: {}", index + 1, total_pages, source, e);
                report.failed_pages += 1;
                continue;
            }
        };

        let (playable, unavailable): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(PlaylistEntry::is_playable);
        report.unavailable += unavailable.len();
        if playable.is_empty() {
            debug!("Page {}/{} of {} had nothing playable", index + 1, total_pages, source);
            continue;
        }

        let tracks = playable.into_iter().map(PlaylistEntry::into_track).collect();
        match session.append(tracks).await {
            None => {
                info!("Guild {} was torn down, abandoning {}", guild_id, source);
                report.stopped_early = true;
                return report;
            }
            Some(Err(MusicError::QueueFull { max })) => {
                info!("Queue for guild {} is full ({}), stopping {}", guild_id, max, source);
                report.stopped_early = true;
                break;
            }
            Some(Err(e)) => {
                warn!("Could not append page of {}: {}", source, e);
                report.failed_pages += 1;
            }
            Some(Ok(appended)) => {
                report.added += appended.added;
                announce(
                    &announcer,
                    Notice::QueuedMore {
                        added: appended.added,
                        total: report.added,
                        source: source.clone(),
                    },
                )
                .await;
                if appended.truncated {
                    info!("Queue for guild {} is full, stopping {}", guild_id, source);
                    report.stopped_early = true;
                    break;
                }
            }
        }
    }

    if report.added == 0 {
        announce(&announcer, Notice::NothingMoreFound { source: source.clone() }).await;
    }
    info!(
        "📜 Finished {} for guild {}: {} added, {} unavailable, {} failed pages",
        source, guild_id, report.added, report.unavailable, report.failed_pages
    );
    report
}

async fn announce(announcer: &Option<Arc<dyn Announcer>>, notice: Notice) {
    if let Some(announcer) = announcer {
        announcer.announce(notice).await;
    }
}

/// Pages for the rest of a YouTube playlist whose first item is already queued.
pub fn playlist_pages(resolver: Arc<dyn TrackResolver>, locator: &str) -> Vec<PageFuture> {
    playlist_chunks()
        .into_iter()
        .map(|chunk| {
            let resolver = resolver.clone();
            let locator = locator.to_string();
            async move { resolver.resolve_playlist_page(&locator, chunk).await }.boxed()
        })
        .collect()
}

/// Pages that map catalog search queries to playable tracks,
/// [`SEARCH_PAGE_SIZE`] at a time. A failed search becomes an unavailable
/// entry rather than failing its page.
pub fn search_pages(resolver: Arc<dyn TrackResolver>, queries: Vec<String>) -> Vec<PageFuture> {
    queries
        .chunks(SEARCH_PAGE_SIZE)
        .map(|chunk| {
            let resolver = resolver.clone();
            let chunk = chunk.to_vec();
            async move {
                let mut entries = Vec::with_capacity(chunk.len());
                for query in chunk {
                    match resolver.resolve_search(&query).await {
                        Ok(track) => entries.push(PlaylistEntry {
                            title: track.title,
                            locator: track.locator,
                            original_url: None,
                        }),
                        Err(e) => {
                            warn!("Could not map \"{}\": {}", query, e);
                            entries.push(PlaylistEntry::default());
                        }
                    }
                }
                Ok::<_, ResolveError>(entries)
            }
            .boxed()
        })
        .collect()
}
