//! Cadence Audio Player (cadence-ap) - Main entry point
//!
//! Plays the given files through the playback controller, using the
//! wall-clock render engine and symphonia for track preparation. Every event
//! is logged as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cadence_ap::audio::{ClockRenderer, SymphoniaPreparer};
use cadence_ap::config::PlayerConfig;
use cadence_ap::playback::{
    PlaybackController, PlaybackSequencer, Playlist, PlaylistAccessor, PlaylistChangeListener,
};
use cadence_common::events::{CadenceEvent, EventBus, PlaybackState, RepeatMode, ShuffleMode};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cadence-ap
#[derive(Parser, Debug)]
#[command(name = "cadence-ap")]
#[command(about = "Cadence audio player playback core")]
#[command(version)]
struct Args {
    /// Audio files to play, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Configuration file (overrides CADENCE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds skipped by seek forward/backward
    #[arg(long)]
    seek_length: Option<u32>,

    /// Repeat mode: off, one, all
    #[arg(long)]
    repeat: Option<RepeatMode>,

    /// Play in shuffled order
    #[arg(long)]
    shuffle: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(seek_length) = args.seek_length {
        config.seek_length_secs = seek_length;
    }
    if let Some(repeat) = args.repeat {
        config.repeat_mode = repeat;
    }
    if args.shuffle {
        config.shuffle_mode = ShuffleMode::On;
    }
    config.validate().context("Invalid configuration")?;

    init_tracing(&config)?;

    info!("Starting Cadence Audio Player with {} files", args.files.len());

    let events = EventBus::new(config.event_bus_capacity);
    let mut event_rx = events.subscribe();
    debug!(
        "Event bus ready (capacity {}, {} subscribers)",
        events.capacity(),
        events.subscriber_count()
    );

    let playlist = Arc::new(Playlist::new(events.clone()));
    playlist.add_tracks(&args.files);
    if playlist.size() == 0 {
        anyhow::bail!("None of the given files can be played");
    }

    let sequence = PlaybackSequencer::with_modes(
        playlist.size(),
        config.repeat_mode,
        config.shuffle_mode,
    );
    let controller = Arc::new(
        PlaybackController::new(
            Arc::new(ClockRenderer::new(tokio::runtime::Handle::current())),
            Arc::clone(&playlist) as Arc<dyn PlaylistAccessor>,
            Box::new(sequence),
            Arc::new(SymphoniaPreparer::new()),
            events,
            config.seek_length_secs,
        )
        .context("Failed to initialize playback controller")?,
    );

    let listener: Arc<dyn PlaylistChangeListener> = controller.clone();
    playlist.add_listener(Arc::downgrade(&listener));

    let listener_task = controller
        .start()
        .context("Failed to start completion listener")?;

    if let Err(e) = controller.toggle_play_pause() {
        error!("Could not start playback: {}", e);
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        if controller.playback_state() == PlaybackState::NoTrack {
            info!("Playback ended");
            break;
        }

        tokio::select! {
            _ = &mut shutdown => {
                controller.stop();
                break;
            }
            received = event_rx.recv() => match received {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Drain anything published while stopping
    while let Ok(event) = event_rx.try_recv() {
        log_event(&event);
    }

    controller.preparation().shutdown();
    listener_task.abort();
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &PlayerConfig) -> Result<()> {
    let level = &config.logging.level;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("cadence_ap={level},cadence_common={level}").into()
    });

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn log_event(event: &CadenceEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!("Event {}: {}", event.event_type(), json),
        Err(e) => warn!("Failed to serialize {} event: {}", event.event_type(), e),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
