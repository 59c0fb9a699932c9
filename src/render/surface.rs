use rayon::prelude::*;
use wgpu;

use super::frame::{FrameRenderer, LineDraw, TEXTURE_FORMAT};
use super::gpu::GpuContext;
use super::pipeline::{Camera, CameraUniforms, MeshVertex, WireframePipeline};
use super::{DeformFn, FrameStream, RenderSurface};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::visual::Icosphere;

/// Offscreen wgpu surface that draws the deformed icosphere as a wireframe.
pub struct HeadlessSurface {
    gpu: GpuContext,
    frame_renderer: FrameRenderer,
    pipeline: WireframePipeline,
    camera: Camera,
    mesh: Icosphere,
    vertices: Vec<MeshVertex>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl HeadlessSurface {
    pub fn new(config: &RenderConfig) -> Result<Self, RenderError> {
        let gpu = GpuContext::new()?;
        let frame_renderer = FrameRenderer::new(&gpu, config.width, config.height);
        let pipeline = WireframePipeline::new(&gpu.device, TEXTURE_FORMAT);
        let mesh = Icosphere::new(1.0, config.detail);

        log::info!(
            "Headless surface {}x{}, icosphere detail {} ({} vertices, {} edges)",
            config.width,
            config.height,
            config.detail,
            mesh.vertex_count(),
            mesh.edges.len()
        );

        let vertex_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh_vertex_buffer"),
            size: (mesh.vertex_count() * std::mem::size_of::<MeshVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let indices: Vec<u32> = mesh.edges.iter().flat_map(|e| e.iter().copied()).collect();
        let index_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh_index_buffer"),
            size: (indices.len() * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue.write_buffer(&index_buffer, 0, bytemuck::cast_slice(&indices));

        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_buffer"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &pipeline.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(Self {
            gpu,
            frame_renderer,
            pipeline,
            camera: Camera::new(config.width, config.height),
            vertices: Vec::with_capacity(mesh.vertex_count()),
            mesh,
            vertex_buffer,
            index_count: indices.len() as u32,
            index_buffer,
            uniform_buffer,
            bind_group,
        })
    }
}

impl RenderSurface for HeadlessSurface {
    fn capture_stream(&mut self, fps: u32) -> Option<FrameStream> {
        Some(FrameStream {
            width: self.frame_renderer.width,
            height: self.frame_renderer.height,
            fps,
        })
    }

    fn render_frame(&mut self, rotation_y: f32, deform: &DeformFn<'_>) -> Result<Vec<u8>, RenderError> {
        self.mesh
            .positions
            .par_iter()
            .zip(self.mesh.normals.par_iter())
            .map(|(p, n)| {
                let out = deform(*p, *n);
                MeshVertex {
                    position: out.position.to_array(),
                    color: out.color.to_array(),
                }
            })
            .collect_into_vec(&mut self.vertices);

        let uniforms = self.camera.uniforms(rotation_y);
        self.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.gpu
            .queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));

        self.frame_renderer.render_lines(
            &self.gpu,
            &LineDraw {
                pipeline: &self.pipeline.pipeline,
                bind_group: &self.bind_group,
                vertices: &self.vertex_buffer,
                indices: &self.index_buffer,
                index_count: self.index_count,
            },
        )
    }
}
