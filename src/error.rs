//! Error types shared by the playback core.
//!
//! Everything coming back from resolvers and the voice transport is converted
//! into one of these at the component boundary, so the coordinator only ever
//! sees typed, user-presentable failures.

use std::fmt;

use thiserror::Error;

use crate::audio::transport::TransportError;

/// A resolver could not turn a locator or query into something playable.
///
/// Always treated as transient: stream resolution is wrapped in a
/// [`RetryPolicy`](crate::audio::retry::RetryPolicy).
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("extractor returned no data for {locator}")]
    NoData { locator: String },

    #[error("no stream URL found for {locator}")]
    NoStream { locator: String },

    #[error("no results for \"{query}\"")]
    NoResults { query: String },

    #[error("extractor failed: {message}")]
    Extractor { message: String },

    #[error("extractor timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("could not parse extractor output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("extractor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Retry budget exhausted; carries the last underlying cause.
#[derive(Debug)]
pub struct FinalFailure<E> {
    pub attempts: u32,
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for FinalFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.source)
    }
}

impl<E> std::error::Error for FinalFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Voice connect/move failures. Fatal for the request that triggered them.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("could not connect to the voice channel: {0}")]
    Failed(#[source] TransportError),

    #[error("voice session was invalidated and the reset attempt failed: {0}")]
    ResetFailed(#[source] TransportError),

    #[error("could not move to the voice channel: {0}")]
    MoveFailed(#[source] TransportError),
}

/// Failures from the catalog (Spotify) collaborator.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog item not found: {id}")]
    NotFound { id: String },

    #[error("catalog authentication failed: {message}")]
    Auth { message: String },

    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned an unexpected response: {message}")]
    Unexpected { message: String },
}

/// Umbrella error for command-level operations.
///
/// The `Display` text doubles as the notice shown to users.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("Could not resolve that track ({0})")]
    Resolution(#[from] ResolveError),

    #[error("Could not play that track ({0})")]
    ResolutionExhausted(#[from] FinalFailure<ResolveError>),

    #[error("{0}")]
    Connection(#[from] ConnectError),

    #[error("{0}")]
    EmptyResult(String),

    #[error("Spotify support is not configured. Set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET.")]
    CatalogUnavailable,

    #[error("Unsupported Spotify URL.")]
    UnsupportedCatalogUrl,

    #[error("Spotify lookup failed ({0})")]
    Catalog(#[from] CatalogError),

    #[error("The queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    #[error("You need to be in a voice channel to use this command.")]
    UserNotInVoice,

    #[error("I'm already in voice here. Use /stop first.")]
    VoiceBusy,

    #[error("The player for this server shut down before the request completed. Try again.")]
    Interrupted,
}

pub type MusicResult<T> = Result<T, MusicError>;
