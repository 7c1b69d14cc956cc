use std::sync::Arc;

use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use tracing::{error, info, warn};

use bonebot::audio::{
    connection::ConnectionManager, coordinator::PlaybackCoordinator, player::MusicPlayer,
    reaper::IdleReaper, songbird_transport::SongbirdTransport,
};
use bonebot::bot::MusicBot;
use bonebot::config::Config;
use bonebot::sources::{CatalogResolver, SpotifyClient, TrackResolver, YtDlpResolver};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bonebot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Bonebot v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let transport = Arc::new(SongbirdTransport::new(songbird.clone(), config.default_volume));
    let connections = ConnectionManager::new(transport, config.voice_reset_delay);

    let resolver: Arc<dyn TrackResolver> = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.resolve_timeout,
    ));

    let catalog: Option<Arc<dyn CatalogResolver>> = match config.spotify_credentials() {
        Some((id, secret)) => match SpotifyClient::new(id, secret) {
            Ok(client) => {
                info!("🎧 Spotify links enabled");
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("⚠️ Spotify client unavailable, links will be rejected: {}", e);
                None
            }
        },
        None => {
            info!("Spotify credentials not set, Spotify links disabled");
            None
        }
    };

    let coordinator = PlaybackCoordinator::new(
        connections,
        resolver.clone(),
        config.retry_policy(),
        config.max_queue_size,
    );
    let player = Arc::new(MusicPlayer::new(
        coordinator.clone(),
        resolver,
        catalog,
        config.queue_page_size,
    ));

    let reaper = IdleReaper::new(coordinator, config.reaper_interval, config.idle_timeout).spawn();

    let handler = MusicBot::new(config.clone(), player);
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    reaper.abort();
    Ok(())
}

/// Exits successfully only if the extractor binary runs.
async fn health_check(config: &Config) -> Result<()> {
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("{} is not working", config.ytdlp_path);
    }
}
