mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use cli::Cli;
use sonosphere::audio::{decode_audio, FeatureExtractor, HeadlessBackend};
use sonosphere::capture::{CaptureSession, CaptureSettings, FfmpegBackend};
use sonosphere::config::{self, Config};
use sonosphere::render::HeadlessSurface;
use sonosphere::{DownloadDir, PlaybackController, Visualizer};

/// How long to wait for the encoder to flush after the last frame.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);

    let input = &cli.input;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("sonosphere - audio-reactive visualizer");
    log::info!("Input: {}", input.display());
    log::info!(
        "Resolution: {}x{} @ {}fps, icosphere detail {}",
        config.render.width,
        config.render.height,
        config.capture.fps,
        config.render.detail
    );

    // 1. Decode audio
    log::info!("Decoding audio...");
    let source = decode_audio(input)?;

    // 2. Initialize GPU surface
    log::info!("Initializing GPU...");
    let surface = HeadlessSurface::new(&config.render).context("Failed to create render surface")?;

    // 3. Wire the visualizer
    let playback = PlaybackController::new(Box::new(HeadlessBackend::new(config.audio.clone())));
    let capture = CaptureSession::new(
        CaptureSettings::from(&config.capture),
        Box::new(FfmpegBackend::default()),
        Box::new(DownloadDir::new(config.capture.output_dir.clone())),
    );
    let mut viz = Visualizer::new(
        playback,
        FeatureExtractor::with_bins(config.audio.smoothing, config.audio.frequency_bin_count()),
        Some(Box::new(surface)),
        capture,
    );

    viz.load(source).context("Failed to load audio source")?;
    if !viz.start_recording(Duration::ZERO)? {
        anyhow::bail!("Recording did not start");
    }

    // 4. Frame loop on a virtual clock
    let fps = config.capture.fps.max(1);
    let dt = 1.0 / fps as f64;
    let duration = viz.playback().duration();

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent}% ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut frame: u64 = 0;
    while viz.capture().is_recording() {
        frame += 1;
        let now = Duration::from_secs_f64(frame as f64 * dt);

        viz.on_frame(dt)?;
        viz.on_tick(now)?;
        pb.set_position((viz.capture().progress() * 1000.0) as u64);

        if let Some(limit) = cli.preview_seconds {
            if now.as_secs_f64() >= limit && viz.capture().is_recording() {
                log::info!("Preview limit of {:.1}s reached", limit);
                viz.stop_recording()?;
            }
        }
    }

    pb.finish_with_message("Rendering complete");
    log::info!(
        "Rendered {} frames ({:.1}s of {:.1}s)",
        frame,
        frame as f64 * dt,
        duration
    );

    // 5. Wait for the encoder to flush and the export to land
    log::info!("Finishing encoding...");
    viz.wait_for_export(FLUSH_TIMEOUT)?;

    match viz.last_export() {
        Some(receipt) if receipt.is_empty() => {
            log::warn!("Done, but the recording is empty: {}", receipt.path.display());
        }
        Some(receipt) => {
            log::info!("Done! Output: {} ({} bytes)", receipt.path.display(), receipt.bytes);
        }
        None => anyhow::bail!("Recording ended without an export"),
    }
    Ok(())
}

/// Load the config file, then let CLI flags override values still at their
/// defaults.
fn resolve_config(cli: &Cli) -> Config {
    let mut cfg = config::find_config(cli.config.as_deref())
        .and_then(|path| {
            let loaded = config::load_config(&path);
            match loaded {
                Some(_) => log::info!("Loaded config from {}", path.display()),
                None => log::warn!("Failed to load config from {}", path.display()),
            }
            loaded
        })
        .unwrap_or_default();

    // Merge: CLI values apply only when they differ from the CLI default
    if cli.width != 1280 { cfg.render.width = cli.width; }
    if cli.height != 720 { cfg.render.height = cli.height; }
    if cli.fps != 60 { cfg.capture.fps = cli.fps; }
    if cli.smoothing != 0.8 { cfg.audio.smoothing = cli.smoothing; }
    if cli.no_audio { cfg.capture.capture_audio = false; }
    if let Some(ref dir) = cli.output_dir {
        cfg.capture.output_dir = dir.clone();
    }
    cfg
}
