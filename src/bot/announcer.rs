use std::sync::Arc;

use async_trait::async_trait;
use serenity::{http::Http, model::id::ChannelId};
use tracing::warn;

use crate::audio::notice::{Announcer, Notice};

/// Posts playback notices to the text channel the last command came from.
pub struct DiscordAnnouncer {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordAnnouncer {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Announcer for DiscordAnnouncer {
    async fn announce(&self, notice: Notice) {
        if let Err(e) = self.channel_id.say(&*self.http, notice.to_string()).await {
            warn!("Could not post notice to {}: {}", self.channel_id, e);
        }
    }
}
