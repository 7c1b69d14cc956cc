use std::collections::VecDeque;

use tracing::debug;

use crate::audio::state::Track;
use crate::error::MusicError;

/// Ordered track list for one guild. Strict FIFO; the only reordering is
/// an explicit [`remove_at`](TrackQueue::remove_at).
///
/// Not synchronized on its own: each queue lives inside a guild actor,
/// which is what makes mutations atomic per guild.
#[derive(Debug)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Appends to the tail and returns the new length.
    pub fn append(&mut self, track: Track) -> Result<usize, MusicError> {
        if self.items.len() >= self.max_size {
            return Err(MusicError::QueueFull { max: self.max_size });
        }

        debug!("➕ Queued: {}", track.title);
        self.items.push_back(track);
        Ok(self.items.len())
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Removes by 1-based position. Out of range yields `None` and leaves
    /// the queue untouched.
    pub fn remove_at(&mut self, position: usize) -> Option<Track> {
        let index = position.checked_sub(1)?;
        let removed = self.items.remove(index);
        if let Some(track) = &removed {
            debug!("❌ Removed #{}: {}", position, track.title);
        }
        removed
    }

    /// Returns whether there was anything to clear.
    pub fn clear(&mut self) -> bool {
        let was_non_empty = !self.items.is_empty();
        self.items.clear();
        was_non_empty
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_size.saturating_sub(self.items.len())
    }
}

/// One display page of a queue snapshot.
#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    /// 1-based position of `items[0]` in the queue.
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl QueuePage {
    /// Builds a page out of a snapshot. `page` is 1-based and clamped to at least 1.
    pub fn from_snapshot(tracks: &[Track], page: usize, items_per_page: usize) -> Self {
        let per_page = items_per_page.max(1);
        let safe_page = page.max(1);
        let start = (safe_page - 1) * per_page;
        let end = (start + per_page).min(tracks.len());
        let total_pages = if tracks.is_empty() {
            1
        } else {
            tracks.len().div_ceil(per_page)
        };

        QueuePage {
            items: if start < tracks.len() {
                tracks[start..end].to_vec()
            } else {
                Vec::new()
            },
            first_position: start + 1,
            current_page: safe_page,
            total_pages,
            total_items: tracks.len(),
        }
    }

    /// Plain text rendering used by the `queue` command.
    pub fn render(&self) -> String {
        if self.total_items == 0 {
            return "Queue is empty.".to_string();
        }

        let mut lines: Vec<String> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, track)| format!("{}. {}", self.first_position + i, track.title))
            .collect();

        if self.items.is_empty() {
            lines.push(format!("Page {} is past the end of the queue.", self.current_page));
        }
        lines.push(format!(
            "Page {}/{} · {} tracks",
            self.current_page, self.total_pages, self.total_items
        ));
        lines.join("\n")
    }
}
