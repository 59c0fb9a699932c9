//! Render surface seam and the headless wgpu implementation.

pub mod frame;
pub mod gpu;
pub mod pipeline;
pub mod surface;

use glam::Vec3;

use crate::error::RenderError;
use crate::visual::Deformed;

pub use surface::HeadlessSurface;

/// Per-vertex deformation callback: `(base position, normal) -> deformed`.
pub type DeformFn<'a> = dyn Fn(Vec3, Vec3) -> Deformed + Sync + 'a;

/// Shape of a capturable frame stream (tightly packed RGBA frames).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStream {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl FrameStream {
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

pub trait RenderSurface {
    /// A frame stream at a fixed target rate, or `None` when the surface
    /// cannot be captured.
    fn capture_stream(&mut self, fps: u32) -> Option<FrameStream>;

    /// Draw the base mesh through `deform`, rotated around Y, and return the
    /// frame as RGBA.
    fn render_frame(&mut self, rotation_y: f32, deform: &DeformFn<'_>) -> Result<Vec<u8>, RenderError>;
}
