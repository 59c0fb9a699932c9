pub mod analyser;
pub mod decode;
pub mod features;
pub mod output;

pub use decode::{decode_audio, AudioSource};
pub use features::{AudioIntensity, FeatureExtractor, FrequencySpectrum, SPECTRUM_BINS};
pub use output::{AudioBackend, AudioOutput, AudioStream, HeadlessBackend};
