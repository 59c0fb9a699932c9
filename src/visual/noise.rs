use glam::Vec3;
use noise::{NoiseFn, Perlin};

/// Smooth 3D coherent noise remapped to [0, 1].
pub struct CoherentNoise {
    perlin: Perlin,
}

impl CoherentNoise {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
        }
    }

    pub fn sample(&self, p: Vec3) -> f32 {
        let v = self.perlin.get([p.x as f64, p.y as f64, p.z as f64]) as f32;
        (v * 0.5 + 0.5).clamp(0.0, 1.0)
    }
}

impl Default for CoherentNoise {
    fn default() -> Self {
        Self::new(0)
    }
}
