//! Audio-reactive icosphere visualizer core.
//!
//! Frequency features are pulled from the playing source once per rendered
//! frame, smoothed, and fed into a per-vertex deformation field. A capture
//! session can record the rendered frames together with the source audio and
//! export the result as a single WebM file.

pub mod app;
pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod playback;
pub mod render;
pub mod visual;

#[cfg(test)]
pub(crate) mod testing;

pub use app::Visualizer;
pub use capture::session::{CaptureSession, CaptureState, StopHandle};
pub use error::{AudioError, CaptureError, ExportError, RenderError};
pub use export::{Blob, DownloadDir, ExportReceipt, ExportSink, EXPORT_FILENAME, EXPORT_MIME};
pub use playback::{PlaybackController, PlaybackState};
