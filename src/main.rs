//! `racelight` command line entry point.
//!
//! ```text
//! racelight [--config racelight.yaml] displays
//! racelight [--config racelight.yaml] screen-sync [--display N] [--compare]
//! racelight [--config racelight.yaml] telemetry
//! ```
//!
//! Lighting events are logged through a dry-run network client. Set
//! `RUST_LOG` to adjust verbosity (default `info`).

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use racelight::bridge::TelemetryBridge;
use racelight::capture::{CaptureDevice, FrameCapture};
use racelight::color::ExtractionAlgorithm;
use racelight::config::SyncConfig;
use racelight::network::{LightingEmitter, LightingNetwork, TracingNetwork};
use racelight::screen_sync::ScreenSync;
use racelight::session::{SegmentOpener, SessionManager};
use racelight::SyncError;

#[derive(Debug, Parser)]
#[command(name = "racelight", about = "Drive a lighting network from simulator telemetry and screen colors", version)]
struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long, global = true, env = "RACELIGHT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the displays available for capture
    Displays,
    /// Mirror the screen color onto the lighting network
    ScreenSync {
        /// Display index, overriding the configuration
        #[arg(long)]
        display: Option<usize>,
        /// Capture one frame and print the color every algorithm extracts
        #[arg(long)]
        compare: bool,
    },
    /// Map simulator flags and RPM onto the lighting network
    Telemetry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        if let Some(sync) = err.downcast_ref::<SyncError>() {
            for suggestion in sync.recovery_suggestions() {
                warn!("Hint: {}", suggestion);
            }
        }
        return Err(err);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SyncConfig::default(),
    };

    match cli.command {
        Command::Displays => list_displays(platform::capture_device()?),
        Command::ScreenSync { display, compare } => {
            if let Some(index) = display {
                config.screen_sync.display = index;
            }
            screen_sync(platform::capture_device()?, &config, compare).await
        }
        Command::Telemetry => telemetry(platform::segment_opener()?, &config).await,
    }
}

fn list_displays<D: CaptureDevice>(device: D) -> anyhow::Result<()> {
    let displays = device.displays()?;
    if displays.is_empty() {
        println!("No displays found");
    }
    for (index, display) in displays.iter().enumerate() {
        println!("[{index}] {display}");
    }
    Ok(())
}

async fn connect_network(config: &SyncConfig) -> anyhow::Result<Arc<TracingNetwork>> {
    let network = Arc::new(TracingNetwork::new(&config.network.url, &config.network.device_name));
    network.connect().await.context("Failed to connect to the lighting network")?;
    Ok(network)
}

async fn screen_sync<D: CaptureDevice>(
    device: D,
    config: &SyncConfig,
    compare: bool,
) -> anyhow::Result<()> {
    let capture = Arc::new(FrameCapture::new(device));
    let displays = capture.list_displays()?;
    let index = config.screen_sync.display;
    let display = displays
        .get(index)
        .ok_or_else(|| anyhow!("Display {index} not found ({} available)", displays.len()))?;
    capture.select_display(Some(display))?;

    if let Some(zone) = config.screen_sync.zone {
        capture.create_capture_zone(zone.x, zone.y, zone.width, zone.height)?;
    }

    if compare {
        capture.ensure_full_display_zone()?;
        let frame = capture.capture_frame()?;
        for (algorithm, color) in ExtractionAlgorithm::compare(&frame) {
            println!("{color}  {algorithm}");
        }
        return Ok(());
    }

    let network = connect_network(config).await?;
    let emitter = LightingEmitter::new(
        Arc::clone(&network),
        config.network.rooms.clone(),
        config.network.send_timeout(),
    );

    let sync = ScreenSync::new(capture, emitter, config.screen_sync.algorithm);
    sync.start()?;
    let display_name = &display.name;
    info!(display = %display_name, "Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    sync.stop_and_wait().await;
    network.disconnect().await?;
    Ok(())
}

async fn telemetry<O: SegmentOpener>(opener: O, config: &SyncConfig) -> anyhow::Result<()> {
    let network = connect_network(config).await?;
    let emitter = LightingEmitter::new(
        Arc::clone(&network),
        config.network.rooms.clone(),
        config.network.send_timeout(),
    );

    let manager = SessionManager::new(opener, config.session);
    let bridge = TelemetryBridge::spawn(&manager.subscribe(), emitter, config.bridge());
    manager.start();
    info!("Waiting for telemetry, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    bridge.shutdown().await;
    manager.stop();
    network.disconnect().await?;
    Ok(())
}

#[cfg(windows)]
mod platform {
    use racelight::Result;
    use racelight::windows::{DxgiCaptureDevice, SharedMemoryOpener};

    pub fn capture_device() -> Result<DxgiCaptureDevice> {
        Ok(DxgiCaptureDevice)
    }

    pub fn segment_opener() -> Result<SharedMemoryOpener> {
        Ok(SharedMemoryOpener)
    }
}

#[cfg(not(windows))]
mod platform {
    use racelight::capture::{CaptureDevice, CaptureZone, Display, PixelView, ScreenCapture, ZoneId};
    use racelight::session::{Segment, SegmentOpener};
    use racelight::telemetry::SegmentKind;
    use racelight::{Result, SyncError};

    /// Placeholder whose every method reports the missing platform support.
    pub enum Unsupported {}

    pub fn capture_device() -> Result<Unsupported> {
        Err(SyncError::unsupported_platform("Screen capture", "Windows"))
    }

    pub fn segment_opener() -> Result<Unsupported> {
        Err(SyncError::unsupported_platform("Live telemetry", "Windows"))
    }

    impl CaptureDevice for Unsupported {
        type Screen = Unsupported;

        fn displays(&self) -> Result<Vec<Display>> {
            match *self {}
        }

        fn open_display(&self, _display: &Display) -> Result<Unsupported> {
            match *self {}
        }
    }

    impl ScreenCapture for Unsupported {
        fn register_zone(&mut self, _zone: CaptureZone) -> Result<ZoneId> {
            match *self {}
        }

        fn unregister_zone(&mut self, _zone: ZoneId) {
            match *self {}
        }

        fn capture(&mut self) -> Result<()> {
            match *self {}
        }

        fn zone_view(&self, _zone: ZoneId) -> Result<PixelView<'_>> {
            match *self {}
        }
    }

    impl SegmentOpener for Unsupported {
        type Segment = Unsupported;

        fn open(&self, _kind: SegmentKind) -> Result<Unsupported> {
            match *self {}
        }
    }

    impl Segment for Unsupported {
        fn read_into(&self, _buf: &mut [u8]) -> Result<usize> {
            match *self {}
        }
    }
}
