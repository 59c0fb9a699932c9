//! Host audio subsystem seam.
//!
//! An [`AudioBackend`] wires a decoded source into an output pipeline
//! (device → analyser → destination) and hands back the [`AudioOutput`]
//! handle. The playback controller owns that handle exclusively.

use std::path::PathBuf;
use std::sync::Arc;

use super::analyser::Analyser;
use super::decode::AudioSource;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Capturable audio of the playing source, consumed by the encoder.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioStream {
    /// File the encoder reads the audio track from
    pub path: PathBuf,
    pub sample_rate: u32,
}

pub trait AudioBackend {
    /// Build a fresh output pipeline for `source`.
    fn connect(&mut self, source: AudioSource) -> Result<Box<dyn AudioOutput>, AudioError>;
}

pub trait AudioOutput {
    fn duration(&self) -> f64;
    fn position(&self) -> f64;
    fn set_position(&mut self, secs: f64);

    fn play(&mut self);
    fn pause(&mut self);

    /// Outputs start suspended until first resumed.
    fn is_suspended(&self) -> bool;
    fn resume(&mut self);

    /// Stop output and drop device resources. The handle is unusable after.
    fn release(&mut self);

    fn frequency_bin_count(&self) -> usize;
    fn byte_frequency_data(&mut self, bins: &mut [u8]);

    fn capture_stream(&self) -> Option<AudioStream>;

    /// Move the play head forward by `dt` seconds. Devices with their own
    /// hardware clock ignore this.
    fn advance(&mut self, dt: f64);
}

/// Backend without a sound card: the play head follows the frame clock.
pub struct HeadlessBackend {
    config: AudioConfig,
}

impl HeadlessBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl AudioBackend for HeadlessBackend {
    fn connect(&mut self, source: AudioSource) -> Result<Box<dyn AudioOutput>, AudioError> {
        if source.sample_rate == 0 {
            return Err(AudioError::Device("source has a zero sample rate".into()));
        }
        let analyser = Analyser::from_config(&self.config);
        log::debug!(
            "Connected headless output: {:.1}s, {} analyser bins",
            source.duration(),
            analyser.frequency_bin_count()
        );
        Ok(Box::new(HeadlessOutput::new(source, analyser)))
    }
}

pub struct HeadlessOutput {
    samples: Arc<[f32]>,
    sample_rate: u32,
    origin: Option<PathBuf>,
    duration: f64,
    position: f64,
    playing: bool,
    suspended: bool,
    released: bool,
    analyser: Analyser,
}

impl HeadlessOutput {
    pub fn new(source: AudioSource, analyser: Analyser) -> Self {
        let duration = source.duration();
        Self {
            samples: source.samples,
            sample_rate: source.sample_rate,
            origin: source.origin,
            duration,
            position: 0.0,
            playing: false,
            suspended: true,
            released: false,
            analyser,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn play_head_sample(&self) -> usize {
        (self.position * self.sample_rate as f64) as usize
    }
}

impl AudioOutput for HeadlessOutput {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn set_position(&mut self, secs: f64) {
        self.position = secs.clamp(0.0, self.duration);
        self.analyser.reset();
    }

    fn play(&mut self) {
        if self.released {
            return;
        }
        // Playing at the end restarts from the top
        if self.position >= self.duration {
            self.position = 0.0;
        }
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) {
        self.suspended = false;
    }

    fn release(&mut self) {
        self.playing = false;
        self.released = true;
        self.samples = Arc::from(Vec::new());
    }

    fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        // A stopped graph feeds silence, so the smoothing decays to zero
        if !self.playing || self.suspended || self.released {
            self.analyser.byte_frequency_data(&[], 0, bins);
            return;
        }
        let end = self.play_head_sample();
        self.analyser.byte_frequency_data(&self.samples, end, bins);
    }

    fn capture_stream(&self) -> Option<AudioStream> {
        if self.released {
            return None;
        }
        self.origin.as_ref().map(|path| AudioStream {
            path: path.clone(),
            sample_rate: self.sample_rate,
        })
    }

    fn advance(&mut self, dt: f64) {
        if !self.playing || self.suspended {
            return;
        }
        self.position = (self.position + dt).min(self.duration);
        if self.position >= self.duration {
            // Natural end of track
            self.playing = false;
        }
    }
}
