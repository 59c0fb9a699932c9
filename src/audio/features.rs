use std::ops::Range;

use crate::playback::PlaybackController;

/// Number of frequency bins the visual pipeline consumes.
pub const SPECTRUM_BINS: usize = 128;

/// Weight of the previous smoothed value in the per-frame update.
pub const DEFAULT_SMOOTHING: f32 = 0.8;

const BASS_BINS: Range<usize> = 0..8;
const MID_BINS: Range<usize> = 8..32;
const BASS_WEIGHT: f32 = 3.0;
const MID_WEIGHT: f32 = 2.0;
const HIGH_WEIGHT: f32 = 1.0;
const INTENSITY_SCALE: f32 = 2.0;

/// Smoothed, normalized frequency bins (0.0-1.0) for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencySpectrum {
    bins: Vec<f32>,
}

impl FrequencySpectrum {
    pub fn silent(len: usize) -> Self {
        Self { bins: vec![0.0; len] }
    }

    pub fn from_bins(bins: Vec<f32>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|&b| b == 0.0)
    }

    pub fn intensity(&self) -> AudioIntensity {
        AudioIntensity::from_spectrum(self)
    }
}

impl Default for FrequencySpectrum {
    fn default() -> Self {
        Self::silent(SPECTRUM_BINS)
    }
}

/// Weighted three-band energy aggregate of a spectrum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioIntensity {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub value: f32,
}

impl AudioIntensity {
    pub fn from_spectrum(spectrum: &FrequencySpectrum) -> Self {
        let bins = spectrum.bins();
        let n = bins.len();
        let bass = weighted_band(bins, BASS_BINS.start..BASS_BINS.end.min(n), BASS_WEIGHT);
        let mid = weighted_band(bins, MID_BINS.start.min(n)..MID_BINS.end.min(n), MID_WEIGHT);
        let high = weighted_band(bins, MID_BINS.end.min(n)..n, HIGH_WEIGHT);

        Self {
            bass,
            mid,
            high,
            value: (bass + mid + high) * INTENSITY_SCALE,
        }
    }
}

/// Weighted band sum divided by `weight * band length`, i.e. the band mean.
fn weighted_band(bins: &[f32], range: Range<usize>, weight: f32) -> f32 {
    if range.is_empty() {
        return 0.0;
    }
    let len = range.len() as f32;
    let sum: f32 = bins[range].iter().map(|&b| b * weight).sum();
    sum / (weight * len)
}

/// Pulls byte spectra from the playing source once per rendered frame and
/// keeps an exponentially smoothed, normalized copy.
pub struct FeatureExtractor {
    smoothing: f32,
    raw: Vec<u8>,
    spectrum: FrequencySpectrum,
}

impl FeatureExtractor {
    pub fn new(smoothing: f32) -> Self {
        Self::with_bins(smoothing, SPECTRUM_BINS)
    }

    pub fn with_bins(smoothing: f32, bins: usize) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 1.0),
            raw: vec![0; bins],
            spectrum: FrequencySpectrum::silent(bins),
        }
    }

    pub fn spectrum(&self) -> &FrequencySpectrum {
        &self.spectrum
    }

    /// Sample the analyser of the loaded source. Without a source the
    /// previous spectrum is left untouched and `false` is returned.
    pub fn extract(&mut self, playback: &mut PlaybackController) -> bool {
        if !playback.frequency_data(&mut self.raw) {
            return false;
        }
        let raw = std::mem::take(&mut self.raw);
        self.apply(&raw);
        self.raw = raw;
        true
    }

    /// One smoothing step: `s = s * a + (raw / 255) * (1 - a)`.
    pub fn apply(&mut self, raw: &[u8]) {
        let a = self.smoothing;
        for (smoothed, &byte) in self.spectrum.bins.iter_mut().zip(raw) {
            let current = byte as f32 / 255.0;
            *smoothed = *smoothed * a + current * (1.0 - a);
        }
    }

    pub fn reset(&mut self) {
        self.spectrum.bins.iter_mut().for_each(|b| *b = 0.0);
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}
