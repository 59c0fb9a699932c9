use crate::audio::{AudioBackend, AudioOutput, AudioSource, AudioStream};
use crate::error::AudioError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// No source loaded
    Stopped,
    Playing,
    Paused,
}

/// Owns the loaded source's output device and its play/pause state.
pub struct PlaybackController {
    backend: Box<dyn AudioBackend>,
    output: Option<Box<dyn AudioOutput>>,
    playing: bool,
}

impl PlaybackController {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            output: None,
            playing: false,
        }
    }

    /// Replace the current source. The previous device is paused and released
    /// before the new pipeline is wired. Leaves playback paused.
    pub fn load(&mut self, source: AudioSource) -> Result<(), AudioError> {
        self.release();

        let duration = source.duration();
        let output = self.backend.connect(source)?;
        log::info!(
            "Loaded source: {:.2}s, {} frequency bins",
            duration,
            output.frequency_bin_count()
        );
        self.output = Some(output);
        self.playing = false;
        Ok(())
    }

    /// Tear down the current source, if any.
    pub fn release(&mut self) {
        if let Some(mut old) = self.output.take() {
            old.pause();
            old.release();
            log::debug!("Released previous audio output");
        }
        self.playing = false;
    }

    pub fn toggle_play(&mut self) {
        let Some(output) = self.output.as_mut() else {
            log::debug!("toggle_play ignored: no source loaded");
            return;
        };

        if output.is_suspended() {
            output.resume();
        }

        if self.playing {
            output.pause();
        } else {
            output.play();
        }
        self.playing = !self.playing;
    }

    pub fn play(&mut self) {
        if let Some(output) = self.output.as_mut() {
            if output.is_suspended() {
                output.resume();
            }
            output.play();
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        if let Some(output) = self.output.as_mut() {
            output.pause();
            self.playing = false;
        }
    }

    pub fn seek(&mut self, secs: f64) {
        if let Some(output) = self.output.as_mut() {
            output.set_position(secs);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn has_source(&self) -> bool {
        self.output.is_some()
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.output, self.playing) {
            (None, _) => PlaybackState::Stopped,
            (Some(_), true) => PlaybackState::Playing,
            (Some(_), false) => PlaybackState::Paused,
        }
    }

    pub fn position(&self) -> f64 {
        self.output.as_ref().map_or(0.0, |o| o.position())
    }

    pub fn duration(&self) -> f64 {
        self.output.as_ref().map_or(0.0, |o| o.duration())
    }

    /// Fill `bins` from the analyser. Returns `false` when nothing is loaded.
    pub fn frequency_data(&mut self, bins: &mut [u8]) -> bool {
        match self.output.as_mut() {
            Some(output) => {
                output.byte_frequency_data(bins);
                true
            }
            None => false,
        }
    }

    pub fn capture_stream(&self) -> Option<AudioStream> {
        self.output.as_ref().and_then(|o| o.capture_stream())
    }

    pub fn advance(&mut self, dt: f64) {
        if let Some(output) = self.output.as_mut() {
            output.advance(dt);
        }
    }
}
