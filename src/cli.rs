use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sonosphere", about = "Audio-reactive icosphere visualizer and recorder")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: PathBuf,

    /// Config file (defaults to sonosphere.toml or the per-user config)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory the recording is exported into
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Frame width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Capture frame rate
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Spectrum smoothing factor (0.0-1.0, weight of the previous frame)
    #[arg(long, default_value_t = 0.8)]
    pub smoothing: f32,

    /// Record video only, without the source audio track
    #[arg(long)]
    pub no_audio: bool,

    /// Stop after this many seconds instead of at the end of the track
    #[arg(long)]
    pub preview_seconds: Option<f64>,
}
