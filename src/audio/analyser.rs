//! Real-time spectrum analyser.
//!
//! Takes the most recent `fft_size` samples before the play head, applies a
//! Blackman window, smooths magnitudes over time and quantizes them to bytes
//! on a decibel scale, the way a browser `AnalyserNode` reports
//! `getByteFrequencyData`.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::config::AudioConfig;

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    previous: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new(fft_size: usize, smoothing: f32, min_decibels: f32, max_decibels: f32) -> Self {
        let fft_size = fft_size.max(32).next_power_of_two();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            window: blackman_window(fft_size),
            smoothing: smoothing.clamp(0.0, 1.0),
            min_decibels,
            max_decibels,
            previous: vec![0.0; fft_size / 2],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn from_config(cfg: &AudioConfig) -> Self {
        Self::new(cfg.fft_size, cfg.analyser_smoothing, cfg.min_decibels, cfg.max_decibels)
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse the window ending at sample index `end` and write one byte per
    /// bin into `out`. Samples before the start of `samples` read as silence.
    pub fn byte_frequency_data(&mut self, samples: &[f32], end: usize, out: &mut [u8]) {
        let end = end.min(samples.len());
        let start = end.saturating_sub(self.fft_size);
        let pad = self.fft_size - (end - start);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { samples[start + i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let range = (self.max_decibels - self.min_decibels).max(f32::EPSILON);
        let tau = self.smoothing;

        for (k, prev) in self.previous.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            let smoothed = tau * *prev + (1.0 - tau) * magnitude;
            // Keep the smoothing state finite for the next frame
            *prev = if smoothed.is_finite() { smoothed } else { 0.0 };

            if let Some(byte) = out.get_mut(k) {
                *byte = if *prev <= 0.0 {
                    0
                } else {
                    let db = 20.0 * prev.log10();
                    (255.0 / range * (db - self.min_decibels)).floor().clamp(0.0, 255.0) as u8
                };
            }
        }
    }

    /// Forget smoothing history, e.g. after a seek.
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|v| *v = 0.0);
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n;
            A0 - A1 * x.cos() + A2 * (2.0 * x).cos()
        })
        .collect()
}
