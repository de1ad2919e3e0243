//! VideoKit headless player - Main entry point
//!
//! Drives a [`DecodeBridge`] from a fixed-rate render tick the way a game or
//! scene host would: one `step` per tick into a CPU texture, with the sound
//! tap played on the default device (`cpal-output` feature) or drained in real
//! time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use videokit_bridge::audio::output::drain_realtime;
use videokit_bridge::audio::RingStreamFactory;
use videokit_bridge::engine::SyntheticEngine;
use videokit_bridge::video::CpuTexture;
use videokit_bridge::{BridgeConfig, DecodeBridge, SessionState};
use videokit_common::config::CONFIG_ENV_VAR;
use videokit_common::human_time::format_progress;

/// Command-line arguments for videokit
#[derive(Parser, Debug)]
#[command(name = "videokit")]
#[command(about = "Headless host for the VideoKit decode bridge")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Media source to play
    #[arg(default_value = "synthetic://demo?duration_ms=10000&fps=30&tone_hz=440")]
    uri: String,

    /// Print bridge events to stdout as JSON lines
    #[arg(long)]
    json_events: bool,

    /// Stop after this many seconds
    #[arg(long)]
    max_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "videokit=debug,videokit_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = BridgeConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    info!("Starting VideoKit host at {} Hz", config.host.tick_rate_hz);

    let sound = Arc::new(RingStreamFactory::new(config.audio.sample_rate, config.audio.channels));
    let tap = sound.tap();

    let mut bridge = DecodeBridge::new(
        config.clone(),
        Arc::new(SyntheticEngine::new()),
        sound,
        tokio::runtime::Handle::current(),
    )
    .context("Failed to create decode bridge")?;

    let shutdown = CancellationToken::new();
    let _output = start_audio_output(&bridge, tap, shutdown.clone());

    if args.json_events {
        let mut events = bridge.subscribe();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(event) => match serde_json::to_string(&event) {
                            Ok(line) => println!("{}", line),
                            Err(e) => warn!("Failed to serialize event: {}", e),
                        },
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Event printer lagged, {} events skipped", n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    let surface = bridge.initialize();
    let mut texture = CpuTexture::new(&surface);
    info!("Texture: {}x{} RGBA", surface.width, surface.height);

    bridge
        .start(&args.uri)
        .with_context(|| format!("Failed to start {}", args.uri))?;

    let tick_period = Duration::from_secs_f64(1.0 / config.host.tick_rate_hz as f64);
    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let deadline = args
        .max_seconds
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut last_report = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            _ = ticker.tick() => {
                bridge.step_into(&mut texture);

                if bridge.state() == SessionState::Idle {
                    info!("Playback finished");
                    break;
                }
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    info!("Time limit reached");
                    break;
                }
                if last_report.elapsed() >= Duration::from_secs(1) {
                    last_report = tokio::time::Instant::now();
                    let stats = bridge.stats();
                    info!(
                        "{} | frames {} rendered / {} dropped | audio {} samples",
                        format_progress(bridge.time(), bridge.length()),
                        stats.frames_rendered,
                        stats.frames_dropped,
                        stats.samples_written
                    );
                }
            }
        }
    }

    bridge.stop();
    let stats = bridge.stats();
    debug!("Final stats: {:?}", stats);
    shutdown.cancel();
    drop(bridge);

    // Let the session wait-loop release the engine
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!("Shutdown complete");
    Ok(())
}

/// Keeps the audio output alive for the lifetime of the host
enum AudioOutputGuard {
    #[cfg(feature = "cpal-output")]
    Device(videokit_bridge::audio::output::CpalOutput),
    Headless,
}

fn start_audio_output(
    bridge: &DecodeBridge,
    tap: videokit_bridge::audio::SoundTap,
    shutdown: CancellationToken,
) -> AudioOutputGuard {
    let format = *bridge.audio_format();

    #[cfg(feature = "cpal-output")]
    {
        match videokit_bridge::audio::output::CpalOutput::start(tap.clone(), format) {
            Ok(output) => {
                info!("Audio output on '{}'", output.device_name());
                return AudioOutputGuard::Device(output);
            }
            Err(e) => warn!("{}; falling back to headless audio", e),
        }
    }

    tokio::spawn(drain_realtime(tap, format, shutdown));
    AudioOutputGuard::Headless
}
