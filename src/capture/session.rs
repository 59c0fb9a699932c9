//! Recording state machine: Idle → Recording → Finalizing → Idle.
//!
//! The session never owns playback. It borrows the controller for the few
//! transitions it drives (seek and play on start, pause once exported) and to
//! read position and duration for progress.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use super::encoder::{CaptureStream, EncoderBackend, EncoderEvent, EncoderSettings, MediaEncoder};
use super::poll::ProgressPoll;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::export::{Blob, ExportReceipt, ExportSink};
use crate::playback::PlaybackController;
use crate::render::RenderSurface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Finalizing,
}

/// Where the recording's audio track comes from. Chosen once per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioCaptureMode {
    /// Tap the playback pipeline's capture stream
    Tap,
    VideoOnly,
}

#[derive(Clone, Debug)]
pub struct CaptureSettings {
    pub fps: u32,
    pub timeslice: Duration,
    pub progress_interval: Duration,
    pub video_bitrate: u64,
    pub audio: AudioCaptureMode,
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            fps: config.fps,
            timeslice: config.timeslice(),
            progress_interval: config.progress_interval(),
            video_bitrate: config.video_bitrate,
            audio: if config.capture_audio {
                AudioCaptureMode::Tap
            } else {
                AudioCaptureMode::VideoOnly
            },
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

/// How a stop request ended.
#[derive(Clone, Debug, PartialEq)]
pub enum StopOutcome {
    Exported(ExportReceipt),
    Aborted(String),
}

/// Resolves once the recording it stopped has been exported (or abandoned).
#[derive(Debug)]
pub struct StopHandle {
    rx: Receiver<StopOutcome>,
    outcome: Option<StopOutcome>,
}

impl StopHandle {
    fn new() -> (Sender<StopOutcome>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx, outcome: None })
    }

    /// Non-blocking check. Returns the outcome once finalization is done.
    pub fn poll(&mut self) -> Option<&StopOutcome> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.outcome = Some(StopOutcome::Aborted("capture session dropped".into()));
                }
            }
        }
        self.outcome.as_ref()
    }

    pub fn is_resolved(&mut self) -> bool {
        self.poll().is_some()
    }

    pub fn receipt(&mut self) -> Option<&ExportReceipt> {
        match self.poll() {
            Some(StopOutcome::Exported(receipt)) => Some(receipt),
            _ => None,
        }
    }
}

pub struct CaptureSession {
    settings: CaptureSettings,
    backend: Box<dyn EncoderBackend>,
    sink: Box<dyn ExportSink>,
    state: CaptureState,
    encoder: Option<Box<dyn MediaEncoder>>,
    poll: Option<ProgressPoll>,
    chunks: Vec<Vec<u8>>,
    progress: f64,
    frames_captured: u64,
    waiters: Vec<Sender<StopOutcome>>,
}

impl CaptureSession {
    pub fn new(
        settings: CaptureSettings,
        backend: Box<dyn EncoderBackend>,
        sink: Box<dyn ExportSink>,
    ) -> Self {
        Self {
            settings,
            backend,
            sink,
            state: CaptureState::Idle,
            encoder: None,
            poll: None,
            chunks: Vec::new(),
            progress: 0.0,
            frames_captured: 0,
            waiters: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Fraction of the track recorded so far, in [0, 1].
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Begin recording from the top of the track.
    ///
    /// Returns `Ok(false)` when a precondition is missing (already capturing,
    /// no source, no surface). Device and encoder failures are errors and
    /// leave the session idle.
    pub fn start(
        &mut self,
        playback: &mut PlaybackController,
        surface: Option<&mut dyn RenderSurface>,
        now: Duration,
    ) -> Result<bool, CaptureError> {
        if self.state != CaptureState::Idle {
            log::debug!("start ignored: capture already {:?}", self.state);
            return Ok(false);
        }
        if !playback.has_source() {
            log::warn!("Cannot start recording: no audio source loaded");
            return Ok(false);
        }
        let Some(surface) = surface else {
            log::warn!("Cannot start recording: no render surface");
            return Ok(false);
        };

        playback.seek(0.0);

        let video = surface
            .capture_stream(self.settings.fps)
            .ok_or(CaptureError::FrameStreamUnavailable)?;
        let audio = match self.settings.audio {
            AudioCaptureMode::Tap => Some(
                playback
                    .capture_stream()
                    .ok_or(CaptureError::AudioStreamUnavailable)?,
            ),
            AudioCaptureMode::VideoOnly => None,
        };
        let stream = CaptureStream { video, audio };

        let encoder = self.backend.open(
            &stream,
            &EncoderSettings {
                timeslice: self.settings.timeslice,
                video_bitrate: self.settings.video_bitrate,
            },
        )?;

        self.encoder = Some(encoder);
        self.chunks.clear();
        self.progress = 0.0;
        self.frames_captured = 0;
        self.poll = Some(ProgressPoll::start(now, self.settings.progress_interval));
        self.state = CaptureState::Recording;

        playback.play();

        log::info!(
            "Recording started: {}x{} @ {}fps, {:.1}s track, audio {:?}",
            stream.video.width,
            stream.video.height,
            stream.video.fps,
            playback.duration(),
            self.settings.audio
        );
        Ok(true)
    }

    /// Feed one rendered frame to the encoder. Ignored unless recording.
    /// A write failure aborts the recording and pauses playback.
    pub fn capture_frame(
        &mut self,
        rgba: &[u8],
        playback: &mut PlaybackController,
    ) -> Result<(), CaptureError> {
        if self.state != CaptureState::Recording {
            return Ok(());
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        if let Err(e) = encoder.write_frame(rgba) {
            self.abort(&e.to_string(), playback);
            return Err(e);
        }
        self.frames_captured += 1;
        Ok(())
    }

    /// Progress poll entry point. Publishes progress when an interval is due
    /// and stops the recording once the track has played through.
    pub fn on_tick(
        &mut self,
        now: Duration,
        playback: &mut PlaybackController,
    ) -> Result<Option<StopHandle>, CaptureError> {
        if self.state != CaptureState::Recording {
            return Ok(None);
        }
        let Some(poll) = self.poll.as_mut() else {
            return Ok(None);
        };
        if !poll.due(now) {
            return Ok(None);
        }

        let duration = playback.duration();
        let position = playback.position();
        if duration <= 0.0 || position >= duration {
            self.progress = 1.0;
            log::info!("End of track reached, finishing recording");
            return self.stop(playback);
        }

        self.progress = (position / duration).min(1.0);
        log::debug!(
            "Recording progress {:.1}% ({:.2}s / {:.2}s, {} chunks)",
            self.progress * 100.0,
            position,
            duration,
            self.chunks.len()
        );
        Ok(None)
    }

    /// Request the end of the recording. A no-op unless recording.
    ///
    /// The progress poll is cancelled before anything else. The returned
    /// handle resolves once the encoder has flushed and the export is done.
    pub fn stop(
        &mut self,
        playback: &mut PlaybackController,
    ) -> Result<Option<StopHandle>, CaptureError> {
        if self.state != CaptureState::Recording {
            log::debug!("stop ignored: capture is {:?}", self.state);
            return Ok(None);
        }

        self.poll = None;
        self.state = CaptureState::Finalizing;

        let (tx, handle) = StopHandle::new();
        self.waiters.push(tx);

        if let Some(encoder) = self.encoder.as_mut() {
            if let Err(e) = encoder.stop() {
                self.abort(&e.to_string(), playback);
                return Err(e);
            }
        }

        log::info!(
            "Stopping recording after {} frames, waiting for encoder flush",
            self.frames_captured
        );
        Ok(Some(handle))
    }

    /// Drain pending encoder events without blocking. Returns the receipt if
    /// this call completed finalization.
    pub fn pump(
        &mut self,
        playback: &mut PlaybackController,
    ) -> Result<Option<ExportReceipt>, CaptureError> {
        while let Some(event) = self.encoder.as_mut().and_then(|e| e.try_event()) {
            if let Some(receipt) = self.handle_event(event, playback)? {
                return Ok(Some(receipt));
            }
        }
        Ok(None)
    }

    /// Stop (if still recording) and block until the export completes.
    pub fn stop_and_wait(
        &mut self,
        playback: &mut PlaybackController,
        timeout: Duration,
    ) -> Result<Option<ExportReceipt>, CaptureError> {
        self.stop(playback)?;
        if self.state != CaptureState::Finalizing {
            return Ok(None);
        }

        if let Some(receipt) = self.pump(playback)? {
            return Ok(Some(receipt));
        }

        let deadline = Instant::now() + timeout;
        while self.state == CaptureState::Finalizing {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(encoder) = self.encoder.as_mut() else {
                break;
            };
            if let Some(event) = encoder.wait_event(remaining) {
                if let Some(receipt) = self.handle_event(event, playback)? {
                    return Ok(Some(receipt));
                }
            }
        }

        self.abort("encoder flush timed out", playback);
        Err(CaptureError::FlushTimeout(timeout))
    }

    fn handle_event(
        &mut self,
        event: EncoderEvent,
        playback: &mut PlaybackController,
    ) -> Result<Option<ExportReceipt>, CaptureError> {
        match event {
            EncoderEvent::Data(bytes) => {
                if bytes.is_empty() {
                    log::debug!("Skipping empty encoder chunk");
                } else {
                    log::debug!("Chunk {}: {} bytes", self.chunks.len(), bytes.len());
                    self.chunks.push(bytes);
                }
                Ok(None)
            }
            EncoderEvent::Stopped => {
                if self.state == CaptureState::Recording {
                    log::warn!("Encoder stopped on its own, finalizing what was recorded");
                    self.poll = None;
                    self.state = CaptureState::Finalizing;
                }
                self.finalize(playback).map(Some)
            }
            EncoderEvent::Failed(reason) => {
                self.abort(&reason, playback);
                Err(CaptureError::Encoder(reason))
            }
        }
    }

    fn finalize(&mut self, playback: &mut PlaybackController) -> Result<ExportReceipt, CaptureError> {
        self.encoder = None;

        let chunks = std::mem::take(&mut self.chunks);
        let blob = Blob::from_chunks(&chunks);
        if blob.is_empty() {
            log::warn!("Recording produced no data, exporting an empty file");
        }

        let result = self.sink.export(&blob);

        self.progress = 0.0;
        self.state = CaptureState::Idle;
        playback.pause();

        match result {
            Ok(receipt) => {
                log::info!(
                    "Recording finalized: {} frames, {} chunks, {} bytes",
                    self.frames_captured,
                    receipt.chunks,
                    receipt.bytes
                );
                self.resolve(StopOutcome::Exported(receipt.clone()));
                Ok(receipt)
            }
            Err(e) => {
                log::error!("Export failed: {}", e);
                self.resolve(StopOutcome::Aborted(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Drop the recording, pause playback and return to Idle without
    /// exporting.
    fn abort(&mut self, reason: &str, playback: &mut PlaybackController) {
        log::error!("Recording aborted: {}", reason);
        self.poll = None;
        self.encoder = None;
        self.chunks.clear();
        self.progress = 0.0;
        self.state = CaptureState::Idle;
        playback.pause();
        self.resolve(StopOutcome::Aborted(reason.to_string()));
    }

    fn resolve(&mut self, outcome: StopOutcome) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{source, FakeBackend, FakeEncoderBackend, FakeSink, FakeSurface};

    struct Rig {
        session: CaptureSession,
        playback: PlaybackController,
        surface: FakeSurface,
        encoder: FakeEncoderBackend,
        sink: FakeSink,
    }

    fn rig_with(settings: CaptureSettings, encoder: FakeEncoderBackend) -> Rig {
        let sink = FakeSink::default();
        let session = CaptureSession::new(settings, Box::new(encoder.clone()), Box::new(sink.clone()));
        Rig {
            session,
            playback: PlaybackController::new(Box::new(FakeBackend::default())),
            surface: FakeSurface::default(),
            encoder,
            sink,
        }
    }

    fn rig() -> Rig {
        rig_with(CaptureSettings::default(), FakeEncoderBackend::default())
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    impl Rig {
        fn start(&mut self, now: Duration) -> Result<bool, CaptureError> {
            self.session
                .start(&mut self.playback, Some(&mut self.surface), now)
        }
    }

    #[test]
    fn start_without_source_is_a_no_op() {
        let mut rig = rig();
        assert!(!rig.start(ms(0)).unwrap());
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert!(rig.encoder.log().opened.is_empty());
    }

    #[test]
    fn start_without_surface_is_a_no_op() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        let started = rig.session.start(&mut rig.playback, None, ms(0)).unwrap();
        assert!(!started);
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert!(!rig.playback.is_playing());
    }

    #[test]
    fn start_rewinds_and_plays() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.playback.play();
        rig.playback.advance(4.0);

        assert!(rig.start(ms(0)).unwrap());
        assert_eq!(rig.session.state(), CaptureState::Recording);
        assert_eq!(rig.playback.position(), 0.0);
        assert!(rig.playback.is_playing());

        let log = rig.encoder.log();
        assert_eq!(log.opened.len(), 1);
        let stream = &log.opened[0];
        assert_eq!(stream.video.fps, 60);
        assert!(stream.audio.is_some());
        assert_eq!(log.timeslice, Some(Duration::from_secs(1)));
    }

    #[test]
    fn second_start_is_ignored() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        assert!(rig.start(ms(0)).unwrap());
        assert!(!rig.start(ms(10)).unwrap());
        assert_eq!(rig.encoder.log().opened.len(), 1);
    }

    #[test]
    fn video_only_mode_skips_audio_stream() {
        let settings = CaptureSettings {
            audio: AudioCaptureMode::VideoOnly,
            ..CaptureSettings::default()
        };
        let mut rig = rig_with(settings, FakeEncoderBackend::default());
        rig.playback.load(source(10.0)).unwrap();
        assert!(rig.start(ms(0)).unwrap());
        assert!(rig.encoder.log().opened[0].audio.is_none());
    }

    #[test]
    fn missing_audio_stream_is_an_error() {
        let backend = FakeBackend::default();
        backend.set_audio_capture(false);
        let mut rig = rig();
        rig.playback = PlaybackController::new(Box::new(backend));
        rig.playback.load(source(10.0)).unwrap();

        let err = rig.start(ms(0)).unwrap_err();
        assert!(matches!(err, CaptureError::AudioStreamUnavailable));
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert!(!rig.playback.is_playing());
    }

    #[test]
    fn uncapturable_surface_is_an_error() {
        let mut rig = rig();
        rig.surface.capturable = false;
        rig.playback.load(source(10.0)).unwrap();
        let err = rig.start(ms(0)).unwrap_err();
        assert!(matches!(err, CaptureError::FrameStreamUnavailable));
        assert_eq!(rig.session.state(), CaptureState::Idle);
    }

    #[test]
    fn encoder_open_failure_leaves_session_idle() {
        let encoder = FakeEncoderBackend::default();
        encoder.log_mut().fail_open = true;
        let mut rig = rig_with(CaptureSettings::default(), encoder);
        rig.playback.load(source(10.0)).unwrap();
        assert!(matches!(rig.start(ms(0)), Err(CaptureError::EncoderUnavailable(_))));
        assert_eq!(rig.session.state(), CaptureState::Idle);
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut rig = rig();
        assert!(rig.session.stop(&mut rig.playback).unwrap().is_none());
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert!(rig.sink.exports().is_empty());
    }

    #[test]
    fn export_waits_for_encoder_confirmation() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.encoder.deliver(b"head".to_vec());

        let mut handle = rig.session.stop(&mut rig.playback).unwrap().unwrap();
        assert_eq!(rig.session.state(), CaptureState::Finalizing);
        assert_eq!(rig.encoder.log().stop_requests, 1);

        assert!(rig.session.pump(&mut rig.playback).unwrap().is_none());
        assert!(rig.sink.exports().is_empty());
        assert!(!handle.is_resolved());

        rig.encoder.confirm_stop();
        let receipt = rig.session.pump(&mut rig.playback).unwrap().unwrap();
        assert_eq!(receipt.bytes, 4);
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert_eq!(handle.receipt(), Some(&receipt));
        assert!(!rig.playback.is_playing());
    }

    #[test]
    fn double_stop_exports_once() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.encoder.deliver(vec![1, 2, 3]);

        let first = rig.session.stop(&mut rig.playback).unwrap();
        let second = rig.session.stop(&mut rig.playback).unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(rig.encoder.log().stop_requests, 1);

        rig.encoder.confirm_stop();
        rig.session.pump(&mut rig.playback).unwrap();
        assert!(rig.session.stop(&mut rig.playback).unwrap().is_none());
        assert_eq!(rig.sink.exports().len(), 1);
    }

    #[test]
    fn chunks_keep_order_and_skip_empty_deliveries() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();

        rig.encoder.deliver(vec![1]);
        rig.encoder.deliver(vec![]);
        rig.encoder.deliver(vec![2, 3]);
        rig.session.pump(&mut rig.playback).unwrap();
        assert_eq!(rig.session.chunk_count(), 2);

        rig.encoder.deliver(vec![4]);
        rig.session.stop(&mut rig.playback).unwrap();
        rig.encoder.confirm_stop();
        rig.session.pump(&mut rig.playback).unwrap();

        let exports = rig.sink.exports();
        assert_eq!(exports[0].data(), &[1, 2, 3, 4]);
        assert_eq!(exports[0].chunk_count(), 3);
    }

    #[test]
    fn flush_chunk_after_stop_is_included() {
        let encoder = FakeEncoderBackend::default();
        {
            let mut log = encoder.log_mut();
            log.flush_chunk = Some(b"tail".to_vec());
            log.confirm_on_stop = true;
        }
        let mut rig = rig_with(CaptureSettings::default(), encoder);
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.encoder.deliver(b"head".to_vec());

        let mut handle = rig.session.stop(&mut rig.playback).unwrap().unwrap();
        let receipt = rig.session.pump(&mut rig.playback).unwrap().unwrap();

        assert_eq!(rig.sink.exports()[0].data(), b"headtail");
        assert_eq!(receipt.chunks, 2);
        assert!(handle.is_resolved());
    }

    #[test]
    fn empty_recording_still_exports() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.session.stop(&mut rig.playback).unwrap();
        rig.encoder.confirm_stop();

        let receipt = rig.session.pump(&mut rig.playback).unwrap().unwrap();
        assert!(receipt.is_empty());
        assert_eq!(rig.sink.exports().len(), 1);
    }

    #[test]
    fn frames_reach_encoder_only_while_recording() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.session.capture_frame(&[0; 16], &mut rig.playback).unwrap();
        rig.start(ms(0)).unwrap();
        rig.session.capture_frame(&[0; 16], &mut rig.playback).unwrap();
        rig.session.capture_frame(&[0; 16], &mut rig.playback).unwrap();
        rig.session.stop(&mut rig.playback).unwrap();
        rig.session.capture_frame(&[0; 16], &mut rig.playback).unwrap();

        assert_eq!(rig.session.frames_captured(), 2);
        assert_eq!(rig.encoder.log().frames, 2);
    }

    #[test]
    fn progress_tracks_position() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();

        rig.playback.advance(2.5);
        assert!(rig.session.on_tick(ms(100), &mut rig.playback).unwrap().is_none());
        assert!((rig.session.progress() - 0.25).abs() < 1e-9);

        // Not due yet: progress unchanged
        rig.playback.advance(2.5);
        rig.session.on_tick(ms(150), &mut rig.playback).unwrap();
        assert!((rig.session.progress() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn zero_length_track_stops_on_first_poll() {
        let mut rig = rig();
        rig.playback.load(source(0.0)).unwrap();
        rig.start(ms(0)).unwrap();
        let handle = rig.session.on_tick(ms(100), &mut rig.playback).unwrap();
        assert!(handle.is_some());
        assert_eq!(rig.session.progress(), 1.0);
        assert_eq!(rig.session.state(), CaptureState::Finalizing);
    }

    #[test]
    fn encoder_stopping_on_its_own_finalizes() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.encoder.deliver(vec![9]);
        rig.encoder.confirm_stop();

        let receipt = rig.session.pump(&mut rig.playback).unwrap().unwrap();
        assert_eq!(receipt.bytes, 1);
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert!(rig.session.on_tick(ms(1000), &mut rig.playback).unwrap().is_none());
    }

    #[test]
    fn encoder_failure_aborts_without_export() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.encoder.deliver(vec![1]);
        let mut handle = rig.session.stop(&mut rig.playback).unwrap().unwrap();
        rig.encoder.fail("disk full");

        let err = rig.session.pump(&mut rig.playback).unwrap_err();
        assert!(matches!(err, CaptureError::Encoder(_)));
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert!(rig.sink.exports().is_empty());
        assert!(matches!(handle.poll(), Some(StopOutcome::Aborted(_))));
        assert!(!rig.playback.is_playing());
    }

    #[test]
    fn frame_write_failure_aborts_and_pauses() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.session.capture_frame(&[0; 16], &mut rig.playback).unwrap();
        rig.encoder.deliver(vec![1, 2]);
        rig.session.pump(&mut rig.playback).unwrap();
        rig.encoder.log_mut().fail_writes = true;

        let err = rig
            .session
            .capture_frame(&[0; 16], &mut rig.playback)
            .unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert_eq!(rig.session.chunk_count(), 0);
        assert!(!rig.playback.is_playing());
        assert!(rig.playback.has_source());
        assert!(rig.sink.exports().is_empty());

        // Idle again: nothing reaches the dropped encoder
        rig.session.capture_frame(&[0; 16], &mut rig.playback).unwrap();
        assert_eq!(rig.encoder.log().frames, 1);
    }

    #[test]
    fn stop_and_wait_times_out_without_confirmation() {
        let mut rig = rig();
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        let err = rig
            .session
            .stop_and_wait(&mut rig.playback, ms(20))
            .unwrap_err();
        assert!(matches!(err, CaptureError::FlushTimeout(_)));
        assert_eq!(rig.session.state(), CaptureState::Idle);
    }

    #[test]
    fn stop_and_wait_returns_receipt() {
        let encoder = FakeEncoderBackend::default();
        encoder.log_mut().confirm_on_stop = true;
        let mut rig = rig_with(CaptureSettings::default(), encoder);
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();
        rig.encoder.deliver(vec![7, 7]);

        let receipt = rig
            .session
            .stop_and_wait(&mut rig.playback, ms(100))
            .unwrap()
            .unwrap();
        assert_eq!(receipt.bytes, 2);
    }

    #[test]
    fn ten_second_track_stops_itself_exactly_once() {
        let encoder = FakeEncoderBackend::default();
        encoder.log_mut().confirm_on_stop = true;
        let mut rig = rig_with(CaptureSettings::default(), encoder);
        rig.playback.load(source(10.0)).unwrap();
        rig.start(ms(0)).unwrap();

        let mut handles = Vec::new();
        let mut receipts = Vec::new();
        let mut max_progress: f64 = 0.0;

        // 100ms virtual ticks, one encoder chunk per simulated second
        for step in 1..=120u64 {
            rig.playback.advance(0.1);
            rig.session.capture_frame(&[0; 16], &mut rig.playback).unwrap();
            if step % 10 == 0 && rig.session.is_recording() {
                rig.encoder.deliver(vec![step as u8]);
            }
            if let Some(handle) = rig.session.on_tick(ms(step * 100), &mut rig.playback).unwrap() {
                max_progress = max_progress.max(rig.session.progress());
                handles.push(handle);
            } else {
                max_progress = max_progress.max(rig.session.progress());
            }
            if let Some(receipt) = rig.session.pump(&mut rig.playback).unwrap() {
                receipts.push(receipt);
            }
        }

        assert_eq!(handles.len(), 1);
        assert_eq!(receipts.len(), 1);
        assert_eq!(rig.encoder.log().stop_requests, 1);
        assert_eq!(max_progress, 1.0);

        let exports = rig.sink.exports();
        assert_eq!(exports.len(), 1);
        assert!(!exports[0].is_empty());
        let data = exports[0].data().to_vec();
        let mut sorted = data.clone();
        sorted.sort();
        assert_eq!(data, sorted);

        assert_eq!(rig.session.state(), CaptureState::Idle);
        assert_eq!(rig.session.progress(), 0.0);
        assert!(!rig.playback.is_playing());
        assert!(handles[0].is_resolved());
    }
}
