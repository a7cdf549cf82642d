//! Presenting to a window or canvas surface.

use crate::gpu::renderer::Renderer;
use crate::material::Material;
use crate::render::{FrameSubmission, RenderBackend};
use crate::shader_animator::UniformHandle;

pub struct SurfaceBackend<'w> {
    renderer: Renderer,
    surface: wgpu::Surface<'w>,
    config: wgpu::SurfaceConfiguration,
}

impl<'w> SurfaceBackend<'w> {
    /// Configure `surface` for `adapter` and build a renderer on `device`.
    pub fn new(
        adapter: &wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: wgpu::Surface<'w>,
        width: u32,
        height: u32,
    ) -> Self {
        let surface_caps = surface.get_capabilities(adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Rgba8UnormSrgb);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = Renderer::new(device, queue, config.format, config.width, config.height);
        Self {
            renderer,
            surface,
            config,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.renderer.resize(width, height);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(self.renderer.device(), &self.config);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

impl RenderBackend for SurfaceBackend<'_> {
    fn program_handle(&mut self, material: &Material) -> Option<UniformHandle> {
        Some(self.renderer.program_handle(material))
    }

    fn present(&mut self, frame: &FrameSubmission<'_>) {
        match self.surface.get_current_texture() {
            Ok(output) => {
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.renderer.render(&view, frame);
                output.present();
            }
            Err(wgpu::SurfaceError::Lost) => {
                self.surface.configure(self.renderer.device(), &self.config);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
            }
        }
    }
}
