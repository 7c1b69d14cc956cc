//! Spotify Web API client, used only to turn Spotify links into search
//! queries. Audio never comes from Spotify.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use regex::Regex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use super::{CatalogResolver, CatalogTrack, CollectionKind};
use crate::error::CatalogError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1/";
const PLAYLIST_PAGE: u32 = 100;
const ALBUM_PAGE: u32 = 50;
/// Refresh this long before Spotify says the token expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*[\(\[\{].*?[\)\]\}]").unwrap_or_else(|e| panic!("invalid pattern: {e}"))
});

/// Drops bracketed noise such as "(Remastered 2011)" or "[Official Video]".
pub fn clean_title(title: &str) -> String {
    BRACKETED.replace_all(title, "").trim().to_string()
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistObject>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Paging<T> {
    #[serde(default)]
    items: Vec<Option<T>>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    #[serde(default)]
    artists: Vec<ArtistObject>,
}

fn artist_names(artists: &[ArtistObject]) -> Vec<String> {
    artists
        .iter()
        .filter_map(|a| a.name.as_deref())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

impl TrackObject {
    /// `None` for local files and removed tracks, which have no name.
    fn into_catalog(self, fallback_artists: &[String]) -> Option<CatalogTrack> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let mut artists = artist_names(&self.artists);
        if artists.is_empty() {
            artists = fallback_artists.to_vec();
        }
        Some(CatalogTrack { name, artists })
    }
}

pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client_id,
            client_secret,
            http,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, CatalogError> {
        if let Some(token) = self.token.lock().as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Auth {
                message: format!("{status}: {body}"),
            });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        debug!("🔑 Spotify token refreshed, valid for {}s", lifetime.as_secs());

        *self.token.lock() = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, id: &str) -> Result<T, CatalogError> {
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(CatalogError::NotFound {
                id: id.to_string(),
            }),
            StatusCode::UNAUTHORIZED => {
                self.token.lock().take();
                Err(CatalogError::Auth {
                    message: "access token rejected".to_string(),
                })
            }
            _ => Ok(response.error_for_status()?.json().await?),
        }
    }

    /// Walks a paged endpoint through its `next` links.
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        first: Url,
        id: &str,
    ) -> Result<Vec<T>, CatalogError> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Paging<T> = self.get(url, id).await?;
            items.extend(page.items.into_iter().flatten());
            next = page.next.as_deref().map(Url::parse).transpose().map_err(|e| {
                CatalogError::Unexpected {
                    message: format!("bad next link: {e}"),
                }
            })?;
        }
        Ok(items)
    }

    async fn playlist_tracks(&self, id: &str) -> Result<Vec<CatalogTrack>, CatalogError> {
        let mut url = endpoint(&format!("playlists/{id}/tracks"))?;
        url.query_pairs_mut()
            .append_pair("limit", &PLAYLIST_PAGE.to_string())
            .append_pair("additional_types", "track");

        let items: Vec<PlaylistItem> = self.collect_pages(url, id).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.track?.into_catalog(&[]))
            .collect())
    }

    async fn album_tracks(&self, id: &str) -> Result<Vec<CatalogTrack>, CatalogError> {
        let album: AlbumObject = self.get(endpoint(&format!("albums/{id}"))?, id).await?;
        let album_artists = artist_names(&album.artists);

        let mut url = endpoint(&format!("albums/{id}/tracks"))?;
        url.query_pairs_mut()
            .append_pair("limit", &ALBUM_PAGE.to_string());

        let tracks: Vec<TrackObject> = self.collect_pages(url, id).await?;
        Ok(tracks
            .into_iter()
            .filter_map(|track| track.into_catalog(&album_artists))
            .collect())
    }
}

fn endpoint(path: &str) -> Result<Url, CatalogError> {
    Url::parse(API_BASE)
        .and_then(|base| base.join(path))
        .map_err(|e| CatalogError::Unexpected {
            message: format!("bad endpoint {path}: {e}"),
        })
}

#[async_trait]
impl CatalogResolver for SpotifyClient {
    async fn resolve_track_meta(&self, id: &str) -> Result<CatalogTrack, CatalogError> {
        let track: TrackObject = self.get(endpoint(&format!("tracks/{id}"))?, id).await?;
        track.into_catalog(&[]).ok_or_else(|| CatalogError::NotFound {
            id: id.to_string(),
        })
    }

    async fn resolve_collection_items(
        &self,
        kind: CollectionKind,
        id: &str,
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        let items = match kind {
            CollectionKind::Track => vec![self.resolve_track_meta(id).await?],
            CollectionKind::Playlist => self.playlist_tracks(id).await?,
            CollectionKind::Album => self.album_tracks(id).await?,
        };
        info!("🎧 Spotify {} {} has {} tracks", kind, id, items.len());
        Ok(items)
    }
}
