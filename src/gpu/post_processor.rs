//! GPU post-processing pipeline.
//!
//! The scene is drawn into `scene_view`, then each resolved stage runs as one
//! full-screen pass, ping-ponging between two intermediate targets. The last
//! stage writes straight into the output view.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::gpu::pipeline::create_post_pipeline;
use crate::post_processing::PostStage;

/// Dynamic uniform offsets must be multiples of this.
const UNIFORM_ALIGNMENT: u64 = 256;

/// Stage slots allocated up front; the buffer grows past this on demand.
const INITIAL_STAGE_CAPACITY: usize = 8;

/// Vertex for fullscreen quad rendering.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Fullscreen quad vertices (two triangles covering NDC).
const QUAD_VERTICES: &[QuadVertex] = &[
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [ 1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [ 1.0,  1.0], uv: [1.0, 0.0] },
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [ 1.0,  1.0], uv: [1.0, 0.0] },
    QuadVertex { position: [-1.0,  1.0], uv: [0.0, 0.0] },
];

/// Per-stage uniforms, padded to one dynamic offset slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct StageUniforms {
    /// code, param0, param1, param2
    stage: [f32; 4],
    /// texel width, texel height, time, unused
    frame: [f32; 4],
    _padding: [[f32; 4]; 14],
}

impl StageUniforms {
    fn new(code: u32, values: [f32; 3], width: u32, height: u32, time: f32) -> Self {
        Self {
            stage: [code as f32, values[0], values[1], values[2]],
            frame: [1.0 / width as f32, 1.0 / height as f32, time, 0.0],
            _padding: [[0.0; 4]; 14],
        }
    }
}

/// Stage code the shader treats as a plain copy.
const COPY_STAGE: u32 = 0;

/// GPU post-processing system.
pub struct PostProcessor {
    /// Intermediate render targets (ping-pong). Textures are held so the
    /// views stay valid.
    _intermediate_textures: [wgpu::Texture; 2],
    intermediate_views: [wgpu::TextureView; 2],
    _scene_texture: wgpu::Texture,
    scene_view: wgpu::TextureView,
    quad_vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    stage_capacity: usize,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl PostProcessor {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let (tex_a, view_a) = create_target(device, format, width, height, "Post-Process Texture A");
        let (tex_b, view_b) = create_target(device, format, width, height, "Post-Process Texture B");
        let (scene_texture, scene_view) = create_target(device, format, width, height, "Scene Texture");

        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Quad Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post-Process Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let texture_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post-Process Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post-Process Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<StageUniforms>() as u64),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Stage Pipeline Layout"),
            bind_group_layouts: &[&texture_bind_group_layout, &uniform_bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = create_post_pipeline(device, &pipeline_layout, format, QuadVertex::desc());

        let (uniform_buffer, uniform_bind_group) =
            create_stage_uniforms(device, &uniform_bind_group_layout, INITIAL_STAGE_CAPACITY);

        Self {
            _intermediate_textures: [tex_a, tex_b],
            intermediate_views: [view_a, view_b],
            _scene_texture: scene_texture,
            scene_view,
            quad_vertex_buffer,
            sampler,
            texture_bind_group_layout,
            uniform_bind_group_layout,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            stage_capacity: INITIAL_STAGE_CAPACITY,
            width,
            height,
            format,
        }
    }

    /// Render the scene to this view; `process` reads from it.
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.scene_view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;

        let (tex_a, view_a) = create_target(device, self.format, width, height, "Post-Process Texture A");
        let (tex_b, view_b) = create_target(device, self.format, width, height, "Post-Process Texture B");
        let (scene_texture, scene_view) = create_target(device, self.format, width, height, "Scene Texture");
        self._intermediate_textures = [tex_a, tex_b];
        self.intermediate_views = [view_a, view_b];
        self._scene_texture = scene_texture;
        self.scene_view = scene_view;
    }

    /// Apply `stages` in order, reading the scene target and writing the
    /// result to `output_view`. An empty chain is a plain copy.
    pub fn process(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        output_view: &wgpu::TextureView,
        stages: &[PostStage],
        time: f32,
    ) {
        let uniforms: Vec<StageUniforms> = if stages.is_empty() {
            vec![StageUniforms::new(COPY_STAGE, [0.0; 3], self.width, self.height, time)]
        } else {
            stages
                .iter()
                .map(|s| StageUniforms::new(s.stage_code, s.values, self.width, self.height, time))
                .collect()
        };

        if uniforms.len() > self.stage_capacity {
            let capacity = uniforms.len().next_power_of_two();
            log::debug!("Growing post stage uniform buffer to {} slots", capacity);
            let (buffer, bind_group) = create_stage_uniforms(device, &self.uniform_bind_group_layout, capacity);
            self.uniform_buffer = buffer;
            self.uniform_bind_group = bind_group;
            self.stage_capacity = capacity;
        }

        let mut data = Vec::with_capacity(uniforms.len() * UNIFORM_ALIGNMENT as usize);
        for u in &uniforms {
            data.extend_from_slice(bytemuck::bytes_of(u));
        }
        queue.write_buffer(&self.uniform_buffer, 0, &data);

        let mut ping = 0;
        for i in 0..uniforms.len() {
            let is_last = i == uniforms.len() - 1;
            let input = if i == 0 {
                &self.scene_view
            } else {
                &self.intermediate_views[1 - ping]
            };
            let output = if is_last {
                output_view
            } else {
                &self.intermediate_views[ping]
            };

            let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Post Stage Texture Bind Group"),
                layout: &self.texture_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

            let label = stages.get(i).map(|s| s.effect_id.as_str()).unwrap_or("copy");
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("Post Stage: {}", label)),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let offset = (i as u64 * UNIFORM_ALIGNMENT) as u32;
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &texture_bind_group, &[]);
            render_pass.set_bind_group(1, &self.uniform_bind_group, &[offset]);
            render_pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
            render_pass.draw(0..6, 0..1);
            drop(render_pass);

            if !is_last {
                ping = 1 - ping;
            }
        }
    }
}

fn create_target(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_stage_uniforms(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Post Stage Uniform Buffer"),
        size: capacity as u64 * UNIFORM_ALIGNMENT,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Post Stage Uniform Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<StageUniforms>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_uniforms_fill_one_slot() {
        assert_eq!(std::mem::size_of::<StageUniforms>() as u64, UNIFORM_ALIGNMENT);
    }

    #[test]
    fn test_stage_uniform_packing() {
        let u = StageUniforms::new(2, [0.35, 0.5, 0.0], 200, 100, 3.0);
        assert_eq!(u.stage, [2.0, 0.35, 0.5, 0.0]);
        assert_eq!(u.frame, [0.005, 0.01, 3.0, 0.0]);

        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&u));
        assert_eq!(floats.len() as u64 * 4, UNIFORM_ALIGNMENT);
        assert_eq!(floats[0], 2.0);
        assert!(floats[8..].iter().all(|f| *f == 0.0));
    }
}
