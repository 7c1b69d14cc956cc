//! # Audio Module
//!
//! Per-guild queueing and playback for Bonebot.
//!
//! ## Architecture
//!
//! ### [`coordinator`] - Playback Coordinator
//! - One actor task per guild owns that guild's [`state::GuildState`]
//! - Queue edits, connects, skips and track completions are messages to it
//! - Drives `Idle → Resolving → Playing → Idle`, skipping tracks that fail
//!
//! ### [`connection`] - Voice Connections
//! - Reuse / move / connect, with one hard reset on a 4006 close
//!
//! ### [`reaper`] and [`bulk`] - Background Work
//! - The idle reaper is the only thing that disconnects an idle guild
//! - Bulk expansion appends playlist pages while playback is running
//!
//! ### [`player`] - Command Surface
//! - What the slash commands call: `play`, `skip`, `queue`, `remove`,
//!   `clear`, `pause`, `resume`, `stop`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bonebot::audio::{
//!     connection::ConnectionManager, coordinator::PlaybackCoordinator,
//!     retry::RetryPolicy, transport::VoiceTransport,
//! };
//! use bonebot::sources::TrackResolver;
//!
//! # fn example(transport: Arc<dyn VoiceTransport>, resolver: Arc<dyn TrackResolver>) {
//! let connections = ConnectionManager::new(transport, Duration::from_secs(1));
//! let coordinator = PlaybackCoordinator::new(connections, resolver, RetryPolicy::default(), 1000);
//! # }
//! ```

pub mod bulk;
pub mod connection;
pub mod coordinator;
pub mod notice;
pub mod player;
pub mod queue;
pub mod reaper;
pub mod retry;
pub mod songbird_transport;
pub mod state;
pub mod transport;
