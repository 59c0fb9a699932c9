//! Per-vertex deformation of the base sphere.
//!
//! Everything here is a pure function of the base vertex, elapsed time and the
//! current spectrum, so vertices can be evaluated in any order or in parallel.

use glam::{Vec3, Vec4};

use super::noise::CoherentNoise;
use crate::audio::{AudioIntensity, FrequencySpectrum};

/// Radians per second around Y while a source is loaded.
pub const ROTATION_SPEED: f32 = 0.2;

pub const BASE_SCALE: f32 = 15.0;
const INTENSITY_SCALE: f32 = 5.0;
const NOISE_FREQUENCY: f32 = 2.0;
const NOISE_DRIFT: f32 = 0.5;
const NOISE_AMPLITUDE: f32 = 4.0;
const WAVE_AMPLITUDE: f32 = 2.0;
const RIPPLE_FREQUENCY: f32 = 8.0;
const RIPPLE_SPEED: f32 = 2.0;
const RIPPLE_AMPLITUDE: f32 = 2.0;

pub const CYAN: Vec3 = Vec3::new(0.0, 0.8, 1.0);
pub const MAGENTA: Vec3 = Vec3::new(1.0, 0.2, 0.8);
const COLOR_CYCLE_SPEED: f32 = 0.5;
const GLOW_MIX: f32 = 0.6;
const VIEW_AXIS: Vec3 = Vec3::Z;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deformed {
    pub position: Vec3,
    /// Linear RGB plus alpha. Alpha may exceed 1.0 at high intensity.
    pub color: Vec4,
}

pub struct DeformationField {
    noise: CoherentNoise,
}

impl DeformationField {
    pub fn new(noise: CoherentNoise) -> Self {
        Self { noise }
    }

    /// Fix time and intensity for one frame.
    pub fn frame(&self, time: f32, spectrum: &FrequencySpectrum) -> FieldFrame<'_> {
        FieldFrame {
            noise: &self.noise,
            time,
            intensity: AudioIntensity::from_spectrum(spectrum).value.max(0.0),
        }
    }

    pub fn deform(&self, base: Vec3, normal: Vec3, time: f32, spectrum: &FrequencySpectrum) -> Deformed {
        self.frame(time, spectrum).deform(base, normal)
    }
}

impl Default for DeformationField {
    fn default() -> Self {
        Self::new(CoherentNoise::default())
    }
}

/// The field at a fixed time and intensity.
#[derive(Clone, Copy)]
pub struct FieldFrame<'a> {
    noise: &'a CoherentNoise,
    pub time: f32,
    pub intensity: f32,
}

impl FieldFrame<'_> {
    pub fn deform(&self, base: Vec3, normal: Vec3) -> Deformed {
        Deformed {
            position: self.position(base, normal),
            color: self.color(normal),
        }
    }

    fn position(&self, base: Vec3, normal: Vec3) -> Vec3 {
        let t = self.time;
        let i = self.intensity;

        let noise = self
            .noise
            .sample(base * NOISE_FREQUENCY + Vec3::splat(t * NOISE_DRIFT));
        let wave = (base.x * 3.0 + t).sin() * (base.z * 2.0 + t).cos();

        let mut p = base * (BASE_SCALE + i * INTENSITY_SCALE);
        p += normal * (noise * i * NOISE_AMPLITUDE + wave * i * WAVE_AMPLITUDE);

        let radial = Vec3::new(base.x, 0.0, base.z).length();
        let ripple = (radial * RIPPLE_FREQUENCY - t * RIPPLE_SPEED).sin() * i;
        p + normal * ripple * RIPPLE_AMPLITUDE
    }

    fn color(&self, normal: Vec3) -> Vec4 {
        let i = self.intensity;
        let cycle = (self.time * COLOR_CYCLE_SPEED).sin() * 0.5 + 0.5;
        let base = CYAN.lerp(MAGENTA, cycle);

        let glow = smoothstep(0.0, 1.0, i);
        let mut rgb = base.lerp(Vec3::ONE, glow * GLOW_MIX);

        let rim = (1.0 - normal.dot(VIEW_AXIS).max(0.0)).powi(3);
        rgb += CYAN * (rim * i);

        rgb.extend(0.8 + i * 0.2)
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
