//! Sorting a `/play` query into the path that handles it.

use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

static YOUTUBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(r"^(https?://)?(www\.)?(youtube\.com|youtu\.?be)/.+$")
});
static SOUNDCLOUD_RE: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"(?:https?://)?(?:www\.)?soundcloud\.com/\S+"));
static SPOTIFY_TRACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(r"open\.spotify\.com/(?:intl-[a-z]{2}/)?track/([A-Za-z0-9]+)")
});
static SPOTIFY_PLAYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(r"open\.spotify\.com/(?:intl-[a-z]{2}/)?playlist/([A-Za-z0-9]+)")
});
static SPOTIFY_ALBUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(r"open\.spotify\.com/(?:intl-[a-z]{2}/)?album/([A-Za-z0-9]+)")
});

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Track,
    Playlist,
    Album,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollectionKind::Track => "track",
            CollectionKind::Playlist => "playlist",
            CollectionKind::Album => "album",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    YouTube { url: String, playlist: bool },
    SoundCloud { url: String },
    Spotify { kind: CollectionKind, id: String },
    /// `open.spotify.com` link we can't map (artist, show, ...).
    UnsupportedSpotify,
    Search { query: String },
}

pub fn classify(query: &str) -> Request {
    let query = query.trim();

    if query.contains("open.spotify.com") {
        let matchers = [
            (CollectionKind::Track, &*SPOTIFY_TRACK_RE),
            (CollectionKind::Playlist, &*SPOTIFY_PLAYLIST_RE),
            (CollectionKind::Album, &*SPOTIFY_ALBUM_RE),
        ];
        return matchers
            .into_iter()
            .find_map(|(kind, re)| {
                re.captures(query).map(|caps| Request::Spotify {
                    kind,
                    id: caps[1].to_string(),
                })
            })
            .unwrap_or(Request::UnsupportedSpotify);
    }

    if SOUNDCLOUD_RE.is_match(query) {
        return Request::SoundCloud {
            url: query.to_string(),
        };
    }

    if YOUTUBE_RE.is_match(query) {
        return Request::YouTube {
            url: query.to_string(),
            playlist: query.contains("list="),
        };
    }

    Request::Search {
        query: query.to_string(),
    }
}
