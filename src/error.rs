use std::time::Duration;

use thiserror::Error;

/// Errors raised by the audio subsystem (decode, device wiring).
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Cannot replace the source while a capture is running")]
    CaptureInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Frame readback failed: {0}")]
    Readback(String),
}

/// Errors while writing the exported recording.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export directory does not exist: {0}")]
    MissingDirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist export: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Capture session failures. Precondition misses (no source, no surface) are
/// not errors; these cover devices and the encoder going wrong.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Render surface has no capturable frame stream")]
    FrameStreamUnavailable,

    #[error("Audio output has no capturable stream")]
    AudioStreamUnavailable,

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Encoder failed: {0}")]
    Encoder(String),

    #[error("Encoder did not finish flushing within {0:?}")]
    FlushTimeout(Duration),

    #[error("Audio device error: {0}")]
    Audio(#[from] AudioError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can go wrong inside one frame callback.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
