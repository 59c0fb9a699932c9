//! Test doubles for the audio device, render surface, encoder and export sink.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;

use crate::audio::{AudioBackend, AudioOutput, AudioSource, AudioStream};
use crate::capture::{CaptureStream, EncoderBackend, EncoderEvent, EncoderSettings, MediaEncoder};
use crate::error::{AudioError, CaptureError, ExportError, RenderError};
use crate::export::{Blob, ExportReceipt, ExportSink, EXPORT_FILENAME};
use crate::render::{DeformFn, FrameStream, RenderSurface};
use crate::visual::Deformed;

/// A source of `secs` seconds at 100 Hz, backed by a (pretend) file.
pub fn source(secs: f64) -> AudioSource {
    let mut source = AudioSource::from_samples(vec![0.0; (secs * 100.0).round() as usize], 100);
    source.origin = Some(PathBuf::from("/tmp/fake.wav"));
    source
}

#[derive(Clone, Debug, Default)]
pub struct FakeDevice {
    pub duration: f64,
    pub position: f64,
    pub playing: bool,
    pub suspended: bool,
    pub released: bool,
}

#[derive(Clone)]
pub struct FakeBackend {
    devices: Rc<RefCell<Vec<FakeDevice>>>,
    level: Rc<Cell<u8>>,
    audio_capture: Rc<Cell<bool>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            devices: Rc::default(),
            level: Rc::default(),
            audio_capture: Rc::new(Cell::new(true)),
        }
    }
}

impl FakeBackend {
    pub fn devices(&self) -> Rc<RefCell<Vec<FakeDevice>>> {
        Rc::clone(&self.devices)
    }

    /// Every bin of every device reads this value.
    pub fn set_bins(&self, level: u8) {
        self.level.set(level);
    }

    pub fn set_audio_capture(&self, available: bool) {
        self.audio_capture.set(available);
    }
}

impl AudioBackend for FakeBackend {
    fn connect(&mut self, source: AudioSource) -> Result<Box<dyn AudioOutput>, AudioError> {
        if source.sample_rate == 0 {
            return Err(AudioError::Device("zero sample rate".into()));
        }
        let mut devices = self.devices.borrow_mut();
        devices.push(FakeDevice {
            duration: source.duration(),
            suspended: true,
            ..FakeDevice::default()
        });
        Ok(Box::new(FakeOutput {
            index: devices.len() - 1,
            devices: Rc::clone(&self.devices),
            level: Rc::clone(&self.level),
            audio_capture: self.audio_capture.get(),
            origin: source.origin,
        }))
    }
}

struct FakeOutput {
    index: usize,
    devices: Rc<RefCell<Vec<FakeDevice>>>,
    level: Rc<Cell<u8>>,
    audio_capture: bool,
    origin: Option<PathBuf>,
}

impl FakeOutput {
    fn device(&self) -> Ref<'_, FakeDevice> {
        Ref::map(self.devices.borrow(), |d| &d[self.index])
    }

    fn device_mut(&self) -> RefMut<'_, FakeDevice> {
        RefMut::map(self.devices.borrow_mut(), |d| &mut d[self.index])
    }
}

impl AudioOutput for FakeOutput {
    fn duration(&self) -> f64 {
        self.device().duration
    }

    fn position(&self) -> f64 {
        self.device().position
    }

    fn set_position(&mut self, secs: f64) {
        let mut device = self.device_mut();
        let duration = device.duration;
        device.position = secs.clamp(0.0, duration);
    }

    fn play(&mut self) {
        self.device_mut().playing = true;
    }

    fn pause(&mut self) {
        self.device_mut().playing = false;
    }

    fn is_suspended(&self) -> bool {
        self.device().suspended
    }

    fn resume(&mut self) {
        self.device_mut().suspended = false;
    }

    fn release(&mut self) {
        let mut device = self.device_mut();
        device.playing = false;
        device.released = true;
    }

    fn frequency_bin_count(&self) -> usize {
        128
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        bins.fill(self.level.get());
    }

    fn capture_stream(&self) -> Option<AudioStream> {
        if !self.audio_capture || self.device().released {
            return None;
        }
        self.origin.as_ref().map(|path| AudioStream {
            path: path.clone(),
            sample_rate: 100,
        })
    }

    fn advance(&mut self, dt: f64) {
        let mut device = self.device_mut();
        if device.playing && !device.suspended {
            let duration = device.duration;
            device.position = (device.position + dt).min(duration);
        }
    }
}

#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub frames: usize,
    pub last_rotation: f32,
    /// Deformation of the +X unit vertex in the last frame
    pub last_vertex: Option<Deformed>,
}

/// 2x2 surface that evaluates the deformation on a single probe vertex.
#[derive(Clone)]
pub struct FakeSurface {
    pub capturable: bool,
    pub log: Rc<RefCell<SurfaceLog>>,
}

impl Default for FakeSurface {
    fn default() -> Self {
        Self {
            capturable: true,
            log: Rc::default(),
        }
    }
}

impl RenderSurface for FakeSurface {
    fn capture_stream(&mut self, fps: u32) -> Option<FrameStream> {
        self.capturable.then_some(FrameStream {
            width: 2,
            height: 2,
            fps,
        })
    }

    fn render_frame(&mut self, rotation_y: f32, deform: &DeformFn<'_>) -> Result<Vec<u8>, RenderError> {
        let mut log = self.log.borrow_mut();
        log.frames += 1;
        log.last_rotation = rotation_y;
        log.last_vertex = Some(deform(Vec3::X, Vec3::X));
        Ok(vec![0; 16])
    }
}

#[derive(Default)]
pub struct EncoderLog {
    pub opened: Vec<CaptureStream>,
    pub timeslice: Option<Duration>,
    pub frames: usize,
    pub stop_requests: usize,
    pub events: VecDeque<EncoderEvent>,
    /// Pushed as a final `Data` event when stop is requested
    pub flush_chunk: Option<Vec<u8>>,
    pub confirm_on_stop: bool,
    pub fail_open: bool,
    /// Every `write_frame` fails with a broken pipe
    pub fail_writes: bool,
}

#[derive(Clone, Default)]
pub struct FakeEncoderBackend {
    log: Rc<RefCell<EncoderLog>>,
}

impl FakeEncoderBackend {
    pub fn log(&self) -> Ref<'_, EncoderLog> {
        self.log.borrow()
    }

    pub fn log_mut(&self) -> RefMut<'_, EncoderLog> {
        self.log.borrow_mut()
    }

    pub fn deliver(&self, chunk: Vec<u8>) {
        self.log.borrow_mut().events.push_back(EncoderEvent::Data(chunk));
    }

    pub fn confirm_stop(&self) {
        self.log.borrow_mut().events.push_back(EncoderEvent::Stopped);
    }

    pub fn fail(&self, reason: &str) {
        self.log
            .borrow_mut()
            .events
            .push_back(EncoderEvent::Failed(reason.to_string()));
    }
}

impl EncoderBackend for FakeEncoderBackend {
    fn open(
        &mut self,
        stream: &CaptureStream,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        let mut log = self.log.borrow_mut();
        if log.fail_open {
            return Err(CaptureError::EncoderUnavailable("fake encoder refused".into()));
        }
        log.opened.push(stream.clone());
        log.timeslice = Some(settings.timeslice);
        Ok(Box::new(FakeEncoder {
            log: Rc::clone(&self.log),
        }))
    }
}

struct FakeEncoder {
    log: Rc<RefCell<EncoderLog>>,
}

impl MediaEncoder for FakeEncoder {
    fn write_frame(&mut self, _rgba: &[u8]) -> Result<(), CaptureError> {
        let mut log = self.log.borrow_mut();
        if log.fail_writes {
            return Err(CaptureError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)));
        }
        log.frames += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let mut log = self.log.borrow_mut();
        log.stop_requests += 1;
        if let Some(chunk) = log.flush_chunk.take() {
            log.events.push_back(EncoderEvent::Data(chunk));
        }
        if log.confirm_on_stop {
            log.events.push_back(EncoderEvent::Stopped);
        }
        Ok(())
    }

    fn try_event(&mut self) -> Option<EncoderEvent> {
        self.log.borrow_mut().events.pop_front()
    }

    fn wait_event(&mut self, timeout: Duration) -> Option<EncoderEvent> {
        let event = self.try_event();
        if event.is_none() {
            std::thread::sleep(timeout.min(Duration::from_millis(5)));
        }
        event
    }
}

/// Keeps every exported blob in memory.
#[derive(Clone, Default)]
pub struct FakeSink {
    exports: Rc<RefCell<Vec<Blob>>>,
}

impl FakeSink {
    pub fn exports(&self) -> Ref<'_, Vec<Blob>> {
        self.exports.borrow()
    }
}

impl ExportSink for FakeSink {
    fn export(&mut self, blob: &Blob) -> Result<ExportReceipt, ExportError> {
        self.exports.borrow_mut().push(blob.clone());
        Ok(ExportReceipt {
            path: PathBuf::from(EXPORT_FILENAME),
            mime: blob.mime(),
            bytes: blob.len(),
            chunks: blob.chunk_count(),
        })
    }
}
