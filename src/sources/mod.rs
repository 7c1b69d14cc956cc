pub mod request;
pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;

use crate::audio::state::Track;
use crate::error::{CatalogError, ResolveError};

pub use request::{classify, CollectionKind, Request};
pub use spotify::SpotifyClient;
pub use ytdlp::YtDlpResolver;

/// A locator resolved to something the transport can actually stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub title: String,
    pub stream_url: String,
}

/// One row of a playlist page. Unavailable entries come back with empty
/// fields instead of failing the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    pub locator: String,
    pub original_url: Option<String>,
}

impl PlaylistEntry {
    pub fn is_playable(&self) -> bool {
        !self.title.trim().is_empty() && !self.locator.trim().is_empty()
    }

    pub fn into_track(self) -> Track {
        Track::new(self.title, self.locator)
    }
}

/// 1-based, inclusive item range within a playlist. `end: None` runs to the
/// end of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub start: usize,
    pub end: Option<usize>,
}

impl PageSpec {
    pub fn range(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn starting_at(start: usize) -> Self {
        Self { start, end: None }
    }
}

/// Page plan used to expand a YouTube playlist after its first item has
/// already been queued.
pub fn playlist_chunks() -> Vec<PageSpec> {
    vec![
        PageSpec::range(2, 10),
        PageSpec::range(11, 50),
        PageSpec::range(51, 100),
        PageSpec::range(101, 200),
        PageSpec::range(201, 300),
        PageSpec::starting_at(301),
    ]
}

/// Turns locators and queries into playable things. Every call is
/// idempotent so the coordinator may retry it freely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve_single(&self, locator: &str) -> Result<ResolvedStream, ResolveError>;

    /// First match wins.
    async fn resolve_search(&self, query: &str) -> Result<Track, ResolveError>;

    async fn resolve_playlist_page(
        &self,
        locator: &str,
        page: PageSpec,
    ) -> Result<Vec<PlaylistEntry>, ResolveError>;
}

/// Metadata for one catalog track, enough to build a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub name: String,
    pub artists: Vec<String>,
}

impl CatalogTrack {
    /// `"<artists> - <name>"` with bracketed noise stripped from the name,
    /// or just the name when no artist is known.
    pub fn search_query(&self) -> String {
        let name = spotify::clean_title(&self.name);
        if self.artists.is_empty() {
            name
        } else {
            format!("{} - {}", self.artists.join(", "), name)
        }
    }

    /// `"<artists> – <name>"` for messages.
    pub fn display_name(&self) -> String {
        if self.artists.is_empty() {
            self.name.clone()
        } else {
            format!("{} – {}", self.artists.join(", "), self.name)
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    async fn resolve_track_meta(&self, id: &str) -> Result<CatalogTrack, CatalogError>;

    async fn resolve_collection_items(
        &self,
        kind: CollectionKind,
        id: &str,
    ) -> Result<Vec<CatalogTrack>, CatalogError>;
}
