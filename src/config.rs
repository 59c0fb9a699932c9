use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Icosphere subdivision level
    #[serde(default = "default_detail")]
    pub detail: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Per-frame spectrum smoothing (weight of the previous value)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_analyser_smoothing")]
    pub analyser_smoothing: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_timeslice_ms")]
    pub timeslice_ms: u64,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// Video bitrate in bits per second
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: u64,
    #[serde(default = "default_capture_audio")]
    pub capture_audio: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            detail: default_detail(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
            fft_size: default_fft_size(),
            analyser_smoothing: default_analyser_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            timeslice_ms: default_timeslice_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            video_bitrate: default_video_bitrate(),
            capture_audio: default_capture_audio(),
            output_dir: default_output_dir(),
        }
    }
}

impl AudioConfig {
    /// FFT length the analyser actually runs: a power of two, at least 32.
    pub fn analyser_fft_size(&self) -> usize {
        self.fft_size.max(32).next_power_of_two()
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.analyser_fft_size() / 2
    }
}

impl CaptureConfig {
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_detail() -> u32 { 4 }
fn default_smoothing() -> f32 { 0.8 }
fn default_fft_size() -> usize { 256 }
fn default_analyser_smoothing() -> f32 { 0.8 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }
fn default_fps() -> u32 { 60 }
fn default_timeslice_ms() -> u64 { 1000 }
fn default_progress_interval_ms() -> u64 { 100 }
fn default_video_bitrate() -> u64 { 12_000_000 }
fn default_capture_audio() -> bool { true }
fn default_output_dir() -> PathBuf { PathBuf::from(".") }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, else `sonosphere.toml` in the working directory, else the
/// per-user config file.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("sonosphere.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("sonosphere").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("sonosphere").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
