use std::fmt;

use async_trait::async_trait;

/// Something the playback core wants the requesting context to hear about.
///
/// Delivery is best-effort: a lost or duplicated notice is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NowPlaying { title: String },
    Skipping { title: String },
    /// A bulk expansion added another batch; `total` is the running count.
    QueuedMore {
        added: usize,
        total: usize,
        source: String,
    },
    /// A bulk expansion finished without adding anything.
    NothingMoreFound { source: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NowPlaying { title } => write!(f, "🎵 Now playing: {title}"),
            Notice::Skipping { title } => write!(f, "⚠️ Error playing {title}. Skipping..."),
            Notice::QueuedMore {
                added,
                total,
                source,
            } => write!(
                f,
                "➕ Queued {added} more tracks from the {source} ({total} so far)."
            ),
            Notice::NothingMoreFound { source } => {
                write!(f, "No additional playable tracks found in the {source}.")
            }
        }
    }
}

#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, notice: Notice);
}
