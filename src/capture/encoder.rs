//! Encoder seam and the ffmpeg-backed recorder.
//!
//! An encoder is opened on a combined capture stream, receives raw RGBA
//! frames, and delivers the encoded container as a sequence of chunks.
//! Stopping is a request: the encoder flushes what it still holds, delivers
//! it, and then confirms with [`EncoderEvent::Stopped`].

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::AudioStream;
use crate::error::CaptureError;
use crate::render::FrameStream;

/// Video from the render surface plus, optionally, the source audio.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureStream {
    pub video: FrameStream,
    pub audio: Option<AudioStream>,
}

#[derive(Clone, Debug)]
pub struct EncoderSettings {
    /// How often buffered output is delivered as a chunk
    pub timeslice: Duration,
    pub video_bitrate: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EncoderEvent {
    Data(Vec<u8>),
    /// All pending data has been delivered
    Stopped,
    Failed(String),
}

pub trait EncoderBackend {
    fn open(
        &mut self,
        stream: &CaptureStream,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError>;
}

pub trait MediaEncoder {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError>;

    /// Ask the encoder to flush and finish. Idempotent.
    fn stop(&mut self) -> Result<(), CaptureError>;

    fn try_event(&mut self) -> Option<EncoderEvent>;

    fn wait_event(&mut self, timeout: Duration) -> Option<EncoderEvent>;
}

/// Groups raw output bytes into timeslice-sized deliveries.
struct ChunkAccumulator {
    timeslice: Duration,
    pending: Vec<u8>,
    last_delivery: Instant,
}

impl ChunkAccumulator {
    fn new(timeslice: Duration, now: Instant) -> Self {
        Self {
            timeslice,
            pending: Vec::new(),
            last_delivery: now,
        }
    }

    fn push(&mut self, bytes: &[u8], now: Instant) -> Option<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        if self.pending.is_empty() || now.duration_since(self.last_delivery) < self.timeslice {
            return None;
        }
        self.last_delivery = now;
        Some(std::mem::take(&mut self.pending))
    }

    fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Spawns one `ffmpeg` process per recording.
#[derive(Clone, Debug)]
pub struct FfmpegBackend {
    pub program: String,
    pub video_codec: String,
    pub audio_codec: String,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            program: "ffmpeg".into(),
            video_codec: "libvpx-vp9".into(),
            audio_codec: "libopus".into(),
        }
    }
}

impl FfmpegBackend {
    fn args(&self, stream: &CaptureStream, settings: &EncoderSettings) -> Vec<String> {
        let video = &stream.video;
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(), "error".into(),
            "-nostats".into(),
            "-f".into(), "rawvideo".into(),
            "-pixel_format".into(), "rgba".into(),
            "-video_size".into(), format!("{}x{}", video.width, video.height),
            "-framerate".into(), video.fps.to_string(),
            "-i".into(), "pipe:0".into(),
        ];

        if let Some(audio) = &stream.audio {
            args.extend(["-i".into(), audio.path.display().to_string()]);
            args.extend(["-map".into(), "0:v".into(), "-map".into(), "1:a".into()]);
        }

        args.extend([
            "-c:v".into(), self.video_codec.clone(),
            "-b:v".into(), settings.video_bitrate.to_string(),
            "-deadline".into(), "realtime".into(),
            "-pix_fmt".into(), "yuv420p".into(),
        ]);

        if stream.audio.is_some() {
            args.extend([
                "-c:a".into(), self.audio_codec.clone(),
                "-b:a".into(), "128k".into(),
                "-shortest".into(),
            ]);
        }

        args.extend(["-f".into(), "webm".into(), "pipe:1".into()]);
        args
    }
}

impl EncoderBackend for FfmpegBackend {
    fn open(
        &mut self,
        stream: &CaptureStream,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        let args = self.args(stream, settings);
        log::debug!("{} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CaptureError::EncoderUnavailable(format!("failed to spawn {}: {}", self.program, e))
            })?;

        let stdin = child.stdin.take();
        let (sender, events) = mpsc::channel();
        let reader = spawn_reader(child, settings.timeslice, sender)?;

        log::info!(
            "Encoder started: {}x{} @ {}fps, {} + {}, timeslice {:?}",
            stream.video.width,
            stream.video.height,
            stream.video.fps,
            self.video_codec,
            if stream.audio.is_some() { self.audio_codec.as_str() } else { "no audio" },
            settings.timeslice
        );

        Ok(Box::new(FfmpegRecorder {
            stdin,
            events,
            _reader: reader,
        }))
    }
}

/// Drains ffmpeg's stdout into timeslice chunks, then reports how it exited.
fn spawn_reader(
    mut child: Child,
    timeslice: Duration,
    sender: Sender<EncoderEvent>,
) -> Result<JoinHandle<()>, CaptureError> {
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| CaptureError::EncoderUnavailable("ffmpeg stdout not available".into()))?;
    let mut stderr = child.stderr.take();

    let stderr_reader = thread::spawn(move || {
        let mut text = String::new();
        if let Some(ref mut err) = stderr {
            let _ = err.read_to_string(&mut text);
        }
        text
    });

    let handle = thread::Builder::new()
        .name("ffmpeg-reader".into())
        .spawn(move || {
            let mut chunks = ChunkAccumulator::new(timeslice, Instant::now());
            let mut buf = vec![0u8; 64 * 1024];
            let mut connected = true;
            let mut failed = false;

            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Some(chunk) = chunks.push(&buf[..n], Instant::now()) {
                            if sender.send(EncoderEvent::Data(chunk)).is_err() {
                                connected = false;
                                break;
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = sender.send(EncoderEvent::Failed(format!("reading ffmpeg output: {}", e)));
                        failed = true;
                        break;
                    }
                }
            }

            // Close our end of the pipe so ffmpeg cannot block on output nobody reads
            drop(stdout);

            if connected && !failed {
                if let Some(chunk) = chunks.finish() {
                    connected = sender.send(EncoderEvent::Data(chunk)).is_ok();
                }
            }

            let stderr_text = stderr_reader.join().unwrap_or_default();
            let status = child.wait();
            if !connected || failed {
                log::debug!("ffmpeg reader exiting early, child status {:?}", status);
                return;
            }
            let event = match status {
                Ok(status) if status.success() => EncoderEvent::Stopped,
                Ok(status) => EncoderEvent::Failed(format!("ffmpeg exited with {}:\n{}", status, stderr_text)),
                Err(e) => EncoderEvent::Failed(format!("waiting for ffmpeg: {}", e)),
            };
            let _ = sender.send(event);
        })?;

    Ok(handle)
}

pub struct FfmpegRecorder {
    stdin: Option<ChildStdin>,
    events: Receiver<EncoderEvent>,
    _reader: JoinHandle<()>,
}

impl MediaEncoder for FfmpegRecorder {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CaptureError::Encoder("encoder input already closed".into()))?;
        stdin.write_all(rgba)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        // Closing stdin is ffmpeg's signal to flush and exit
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        Ok(())
    }

    fn try_event(&mut self) -> Option<EncoderEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(EncoderEvent::Failed("encoder thread exited".into())),
        }
    }

    fn wait_event(&mut self, timeout: Duration) -> Option<EncoderEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(EncoderEvent::Failed("encoder thread exited".into())),
        }
    }
}
