use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::retry::RetryPolicy;

/// Looked up in the working directory (`bonebot.toml`, `bonebot.json`, ...).
const CONFIG_FILE: &str = "bonebot";

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // slash commands register here only, for development

    // Playback
    pub idle_timeout: Duration,
    pub reaper_interval: Duration,
    pub retry_attempts: u32,
    pub retry_initial_delay: Duration,
    pub retry_multiplier: u32,
    pub voice_reset_delay: Duration,
    pub max_queue_size: usize,
    pub queue_page_size: usize,
    pub default_volume: f32,
    pub leave_when_alone: bool,

    // Extractor
    pub ytdlp_path: String,
    pub resolve_timeout: Duration,

    // Spotify (optional)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

/// Shape of the layered sources before durations are parsed.
#[derive(Debug, Deserialize)]
struct RawConfig {
    discord_token: String,
    guild_id: Option<u64>,
    idle_timeout: String,
    reaper_interval: String,
    retry_attempts: u32,
    retry_initial_delay: String,
    retry_multiplier: u32,
    voice_reset_delay: String,
    max_queue_size: usize,
    queue_page_size: usize,
    default_volume: f32,
    leave_when_alone: bool,
    ytdlp_path: String,
    resolve_timeout: String,
    spotify_client_id: Option<String>,
    spotify_client_secret: Option<String>,
}

impl Config {
    /// Defaults, then `bonebot.toml` if present, then environment variables
    /// (after loading `.env`).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = with_defaults(config::Config::builder())?
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::default().try_parsing(true));

        Self::build(builder)
    }

    /// Defaults overlaid with a single file; the environment is ignored.
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = with_defaults(config::Config::builder())?.add_source(config::File::from(path));
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let raw: RawConfig = builder
            .build()?
            .try_deserialize()
            .context("invalid configuration")?;

        let config = Self {
            discord_token: raw.discord_token,
            guild_id: raw.guild_id,
            idle_timeout: duration("idle_timeout", &raw.idle_timeout)?,
            reaper_interval: duration("reaper_interval", &raw.reaper_interval)?,
            retry_attempts: raw.retry_attempts,
            retry_initial_delay: duration("retry_initial_delay", &raw.retry_initial_delay)?,
            retry_multiplier: raw.retry_multiplier,
            voice_reset_delay: duration("voice_reset_delay", &raw.voice_reset_delay)?,
            max_queue_size: raw.max_queue_size,
            queue_page_size: raw.queue_page_size,
            default_volume: raw.default_volume,
            leave_when_alone: raw.leave_when_alone,
            ytdlp_path: raw.ytdlp_path,
            resolve_timeout: duration("resolve_timeout", &raw.resolve_timeout)?,
            spotify_client_id: raw.spotify_client_id.filter(|s| !s.trim().is_empty()),
            spotify_client_secret: raw.spotify_client_secret.filter(|s| !s.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is required");
        }

        if self.guild_id == Some(0) {
            anyhow::bail!("GUILD_ID must be a real guild id, got 0");
        }

        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if self.retry_attempts == 0 {
            anyhow::bail!("Retry attempts must be at least 1");
        }

        if self.retry_multiplier == 0 {
            anyhow::bail!("Retry multiplier must be at least 1");
        }

        if self.reaper_interval.is_zero() {
            anyhow::bail!("Reaper interval must be greater than 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("Set both SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET, or neither");
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            self.retry_initial_delay,
            self.retry_multiplier,
        )
    }

    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        Some((
            self.spotify_client_id.clone()?,
            self.spotify_client_secret.clone()?,
        ))
    }

    /// Returns a summary of the current configuration for logging, without secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Playback: {}% vol, {} queue, {} per page, leave when alone={}\n  \
            Idle: timeout {}, sweep every {}\n  \
            Retry: {} attempts from {} x{}\n  \
            Extractor: {} (timeout {})\n  \
            Spotify: {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("in guild {id}")),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.queue_page_size,
            self.leave_when_alone,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.reaper_interval),
            self.retry_attempts,
            humantime::format_duration(self.retry_initial_delay),
            self.retry_multiplier,
            self.ytdlp_path,
            humantime::format_duration(self.resolve_timeout),
            if self.spotify_client_id.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(builder
        .set_default("discord_token", "")?
        .set_default("idle_timeout", "30m")?
        .set_default("reaper_interval", "1m")?
        .set_default("retry_attempts", 5)?
        .set_default("retry_initial_delay", "2s")?
        .set_default("retry_multiplier", 2)?
        .set_default("voice_reset_delay", "1s")?
        .set_default("max_queue_size", 1000)?
        .set_default("queue_page_size", 20)?
        .set_default("default_volume", 0.25)?
        .set_default("leave_when_alone", true)?
        .set_default("ytdlp_path", "yt-dlp")?
        .set_default("resolve_timeout", "60s")?)
}

fn duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .with_context(|| format!("{key}: \"{value}\" is not a duration (try \"30m\" or \"2s\")"))
}
