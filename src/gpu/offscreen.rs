//! Headless GPU target: renders into a texture and reads frames back.

use anyhow::{Context, Result};
use std::path::Path;

use crate::gpu::renderer::Renderer;
use crate::material::Material;
use crate::render::{FrameSubmission, RenderBackend};
use crate::shader_animator::UniformHandle;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

pub struct OffscreenBackend {
    renderer: Renderer,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    output_buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    width: u32,
    height: u32,
    frames: u64,
}

impl OffscreenBackend {
    /// Request a headless adapter and set up a `width` x `height` target.
    pub async fn new(width: u32, height: u32) -> Result<Self> {
        let width = width.max(1);
        let height = height.max(1);

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None, // Headless
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;
        log::info!("Offscreen adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .context("Failed to create device")?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Target Texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Rows in a texture-to-buffer copy must be 256-byte aligned
        let unpadded_bytes_per_row = std::mem::size_of::<u32>() as u32 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row + (align - unpadded_bytes_per_row % align) % align;

        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let renderer = Renderer::new(device, queue, TARGET_FORMAT, width, height);

        Ok(Self {
            renderer,
            texture,
            view,
            output_buffer,
            padded_bytes_per_row,
            width,
            height,
            frames: 0,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// Copy the last presented frame back as tightly packed RGBA8 rows.
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        let device = self.renderer.device();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.renderer.queue().submit(Some(encoder.finish()));

        let buffer_slice = self.output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("Readback callback dropped")?
            .context("Failed to map output buffer")?;

        let row_bytes = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        {
            let data = buffer_slice.get_mapped_range();
            for row in 0..self.height {
                let start = (row * self.padded_bytes_per_row) as usize;
                pixels.extend_from_slice(&data[start..start + row_bytes]);
            }
        }
        self.output_buffer.unmap();

        Ok(pixels)
    }

    /// Read the last frame back and write it as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let pixels = self.read_pixels()?;
        image::save_buffer(path, &pixels, self.width, self.height, image::ColorType::Rgba8)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

impl RenderBackend for OffscreenBackend {
    fn program_handle(&mut self, material: &Material) -> Option<UniformHandle> {
        Some(self.renderer.program_handle(material))
    }

    fn present(&mut self, frame: &FrameSubmission<'_>) {
        self.renderer.render(&self.view, frame);
        self.frames += 1;
    }
}
