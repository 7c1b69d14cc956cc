//! Bonebot: a Discord music bot built around a per-guild playback coordinator.
//!
//! The binary in `main.rs` is a thin serenity front-end; everything it
//! calls lives here so the playback core can be driven from tests.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
