//! Dead-chat bot entry point.

use deadchat::clock::{Clock, SystemClock};
use deadchat::config::Config;
use deadchat::deadchat::DeadChatEngine;
use deadchat::messaging::PlatformDyn;
use deadchat::messaging::discord::{self, DiscordPlatform, Handler};
use deadchat::purge::PurgeEngine;

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inbound event queue depth per engine.
const EVENT_QUEUE_DEPTH: usize = 256;

#[derive(Parser)]
#[command(name = "deadchat")]
#[command(about = "Rewards whoever revives a dead Discord channel with a single-holder role")]
struct Cli {
    /// Path to a TOML config file (optional; environment overrides it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write logs to a daily-rolling file in this directory instead of stdout
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_tracing(cli.debug, cli.log_dir.as_deref())?;

    tracing::info!("Starting dead-chat bot...");

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        Config::load().with_context(|| "failed to load configuration from environment")?
    };

    if config.dead_chat.is_none() && config.purge.is_none() {
        tracing::warn!("no behaviors enabled, the bot will only stay connected");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let liveness_handle = match &config.liveness {
        Some(liveness) => {
            match deadchat::liveness::start_liveness_server(liveness, shutdown_rx.clone()).await {
                Ok(handle) => Some(handle),
                Err(error) => {
                    tracing::error!(%error, "liveness server failed to start");
                    None
                }
            }
        }
        None => None,
    };

    let (message_tx, message_rx) = match config.dead_chat {
        Some(_) => {
            let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
            (Some(tx), Some(rx))
        }
        None => (None, None),
    };
    let (member_tx, member_rx) = match config.purge {
        Some(_) => {
            let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
            (Some(tx), Some(rx))
        }
        None => (None, None),
    };

    let mut client = serenity::Client::builder(&config.discord_token, discord::intents())
        .event_handler(Handler::new(message_tx, member_tx))
        .await
        .context("failed to build discord client")?;

    let platform: Arc<dyn PlatformDyn> = Arc::new(
        DiscordPlatform::connect(client.http.clone())
            .await
            .context("failed to connect to discord")?,
    );
    tracing::info!(platform = platform.name(), "platform connected");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut engine_handles = Vec::new();

    if let (Some(dead_chat), Some(message_rx)) = (config.dead_chat.clone(), message_rx) {
        let engine = DeadChatEngine::new(dead_chat, platform.clone(), clock.as_ref())
            .context("failed to initialize dead-chat engine")?;
        engine_handles.push(tokio::spawn(engine.run(message_rx, shutdown_rx.clone())));
    }

    if let (Some(purge), Some(member_rx)) = (config.purge, member_rx) {
        let engine = PurgeEngine::new(purge, platform.clone(), clock.clone());
        engine_handles.push(tokio::spawn(engine.run(member_rx, shutdown_rx.clone())));
    }

    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => {
            if let Err(error) = result {
                tracing::error!(%error, "discord client stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    }

    tracing::info!("Shutting down...");
    shutdown_tx.send(true).ok();

    for handle in engine_handles {
        if let Err(error) = handle.await {
            tracing::warn!(%error, "engine task ended abnormally");
        }
    }
    if let Some(handle) = liveness_handle {
        handle.await.ok();
    }

    tracing::info!("Dead-chat bot stopped");
    Ok(())
}

/// Initialize tracing to stdout, or to a daily-rolling file when `log_dir`
/// is set. The returned guard must live until exit so buffered lines flush.
fn init_tracing(
    debug: bool,
    log_dir: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let Some(log_dir) = log_dir else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "deadchat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}
