//! The visualizer context: every long-lived resource in one owned place.
//!
//! Two callbacks drive it. `on_frame` runs at the display rate and does
//! extraction, deformation, rendering and frame capture. `on_tick` is the
//! wall-clock poll that moves recording progress forward.

use std::time::Duration;

use crate::audio::{AudioSource, FeatureExtractor, FrequencySpectrum};
use crate::capture::{CaptureSession, CaptureState, StopHandle};
use crate::error::{AudioError, CaptureError, FrameError};
use crate::export::ExportReceipt;
use crate::playback::PlaybackController;
use crate::render::RenderSurface;
use crate::visual::{DeformationField, ROTATION_SPEED};

pub struct Visualizer {
    playback: PlaybackController,
    extractor: FeatureExtractor,
    field: DeformationField,
    surface: Option<Box<dyn RenderSurface>>,
    capture: CaptureSession,
    time: f32,
    rotation: f32,
    last_export: Option<ExportReceipt>,
}

impl Visualizer {
    pub fn new(
        playback: PlaybackController,
        extractor: FeatureExtractor,
        surface: Option<Box<dyn RenderSurface>>,
        capture: CaptureSession,
    ) -> Self {
        Self {
            playback,
            extractor,
            field: DeformationField::default(),
            surface,
            capture,
            time: 0.0,
            rotation: 0.0,
            last_export: None,
        }
    }

    /// Replace the audio source. Refused while a recording is in flight.
    pub fn load(&mut self, source: AudioSource) -> Result<(), AudioError> {
        if self.capture.state() != CaptureState::Idle {
            return Err(AudioError::CaptureInProgress);
        }
        self.playback.load(source)?;
        self.extractor.reset();
        Ok(())
    }

    pub fn toggle_play(&mut self) {
        self.playback.toggle_play();
    }

    pub fn start_recording(&mut self, now: Duration) -> Result<bool, CaptureError> {
        let surface = self
            .surface
            .as_mut()
            .map(|s| s.as_mut() as &mut dyn RenderSurface);
        self.capture.start(&mut self.playback, surface, now)
    }

    pub fn stop_recording(&mut self) -> Result<Option<StopHandle>, CaptureError> {
        self.capture.stop(&mut self.playback)
    }

    /// Advance by `dt` seconds and draw one frame.
    pub fn on_frame(&mut self, dt: f64) -> Result<(), FrameError> {
        self.playback.advance(dt);
        self.time += dt as f32;

        if self.extractor.extract(&mut self.playback) {
            self.rotation += dt as f32 * ROTATION_SPEED;
        }

        if let Some(surface) = self.surface.as_mut() {
            let frame = self.field.frame(self.time, self.extractor.spectrum());
            let rgba = surface.render_frame(self.rotation, &|base, normal| frame.deform(base, normal))?;
            self.capture.capture_frame(&rgba, &mut self.playback)?;
        }

        self.pump()?;
        Ok(())
    }

    /// Progress poll. Returns a stop handle when the end of the track
    /// stopped the recording.
    pub fn on_tick(&mut self, now: Duration) -> Result<Option<StopHandle>, CaptureError> {
        let handle = self.capture.on_tick(now, &mut self.playback)?;
        self.pump()?;
        Ok(handle)
    }

    /// Block until a stopping (or still running) recording is exported.
    pub fn wait_for_export(&mut self, timeout: Duration) -> Result<Option<ExportReceipt>, CaptureError> {
        let receipt = self.capture.stop_and_wait(&mut self.playback, timeout)?;
        if let Some(ref receipt) = receipt {
            self.last_export = Some(receipt.clone());
        }
        Ok(receipt)
    }

    fn pump(&mut self) -> Result<(), CaptureError> {
        if let Some(receipt) = self.capture.pump(&mut self.playback)? {
            self.last_export = Some(receipt);
        }
        Ok(())
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    pub fn spectrum(&self) -> &FrequencySpectrum {
        self.extractor.spectrum()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn last_export(&self) -> Option<&ExportReceipt> {
        self.last_export.as_ref()
    }
}
