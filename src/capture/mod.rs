pub mod encoder;
pub mod poll;
pub mod session;

pub use encoder::{
    CaptureStream, EncoderBackend, EncoderEvent, EncoderSettings, FfmpegBackend, MediaEncoder,
};
pub use poll::ProgressPoll;
pub use session::{
    AudioCaptureMode, CaptureSession, CaptureSettings, CaptureState, StopHandle, StopOutcome,
};
