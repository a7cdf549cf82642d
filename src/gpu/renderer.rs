//! GPU renderer for a dreamscape frame.
//!
//! Draws the submitted meshes and particle fields into the post-processor's
//! scene target, then runs the resolved post stages into the output view.

use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::iter;
use wgpu::util::DeviceExt;

use crate::camera::CameraUniforms;
use crate::gpu::mesh::{self, Vertex};
use crate::gpu::pipeline::{self, DEPTH_FORMAT};
use crate::gpu::post_processor::PostProcessor;
use crate::material::{BlendMode, Material, MaterialId, ShaderProgram};
use crate::render::{DrawItem, FrameSubmission, ParticleBatch};
use crate::scene_graph::GeometryKind;
use crate::shader_animator::UniformHandle;

/// Maximum number of meshes that can be rendered per frame.
/// Each mesh needs its own uniform slot in the dynamic uniform buffer.
const MAX_MESHES_PER_FRAME: usize = 64;

/// Maximum number of particle fields per frame.
const MAX_FIELDS_PER_FRAME: usize = 8;

/// Uniform buffer alignment (WebGPU minUniformBufferOffsetAlignment is typically 256 bytes)
const UNIFORM_ALIGNMENT: usize = 256;

/// Matches `ObjectUniforms` in the mesh shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ObjectUniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    base_color: [f32; 4],
    glow_color: [f32; 4],
    camera_position: [f32; 4],
    /// time, pulse, bob, displacement
    anim: [f32; 4],
    /// glow, unused x3
    extra: [f32; 4],
    // 208 bytes of data + 48 bytes padding
    _padding: [f32; 12],
}

impl ObjectUniforms {
    fn new(camera: &CameraUniforms, draw: &DrawItem) -> Self {
        let s = &draw.shader;
        Self {
            view_proj: camera.view_proj,
            model: draw.model.to_cols_array_2d(),
            base_color: draw.base_color,
            glow_color: draw.glow_color,
            camera_position: camera.position,
            anim: [s.time, s.pulse, s.bob, s.displacement],
            extra: [draw.glow, 0.0, 0.0, 0.0],
            _padding: [0.0; 12],
        }
    }
}

/// Matches `PointUniforms` in points.wgsl.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct PointUniforms {
    view_proj: [[f32; 4]; 4],
    color: [f32; 4],
    /// point size, time, unused x2
    params: [f32; 4],
    _padding: [[f32; 4]; 10],
}

/// Shared geometry for a mesh type.
struct MeshGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

/// GPU copy of one particle field.
struct FieldBuffer {
    buffer: wgpu::Buffer,
    /// Capacity in points.
    capacity: usize,
    count: u32,
    version: u64,
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,

    // Mesh rendering
    mesh_pipeline_layout: wgpu::PipelineLayout,
    mesh_pipelines: HashMap<(ShaderProgram, BlendMode), wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    mesh_bind_group: wgpu::BindGroup,
    geometries: HashMap<GeometryKind, MeshGeometry>,

    /// Handles given out per material; stable for the renderer's lifetime.
    program_handles: HashMap<MaterialId, UniformHandle>,

    // Particle rendering
    point_pipeline: wgpu::RenderPipeline,
    point_uniform_buffer: wgpu::Buffer,
    point_bind_group: wgpu::BindGroup,
    field_buffers: HashMap<usize, FieldBuffer>,

    #[allow(dead_code)]
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,

    post_processor: PostProcessor,
}

impl Renderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let mesh_bind_group_layout = create_dynamic_uniform_layout(
            &device,
            "Mesh Bind Group Layout",
            std::mem::size_of::<ObjectUniforms>() as u64,
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let mesh_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&mesh_bind_group_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniform Buffer"),
            size: (MAX_MESHES_PER_FRAME * UNIFORM_ALIGNMENT) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mesh_bind_group = create_dynamic_uniform_bind_group(
            &device,
            "Mesh Bind Group",
            &mesh_bind_group_layout,
            &uniform_buffer,
            std::mem::size_of::<ObjectUniforms>() as u64,
        );

        let geometries = GeometryKind::ALL
            .iter()
            .map(|&kind| {
                let (vertices, indices) = mesh::create_geometry(kind);
                (kind, create_mesh_geometry(&device, kind, &vertices, &indices))
            })
            .collect();

        let point_bind_group_layout = create_dynamic_uniform_layout(
            &device,
            "Point Bind Group Layout",
            std::mem::size_of::<PointUniforms>() as u64,
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let point_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Pipeline Layout"),
            bind_group_layouts: &[&point_bind_group_layout],
            push_constant_ranges: &[],
        });
        let point_pipeline = pipeline::create_point_pipeline(&device, &point_pipeline_layout, format);
        let point_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Point Uniform Buffer"),
            size: (MAX_FIELDS_PER_FRAME * UNIFORM_ALIGNMENT) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let point_bind_group = create_dynamic_uniform_bind_group(
            &device,
            "Point Bind Group",
            &point_bind_group_layout,
            &point_uniform_buffer,
            std::mem::size_of::<PointUniforms>() as u64,
        );

        let (depth_texture, depth_view) = create_depth_texture(&device, size);
        let post_processor = PostProcessor::new(&device, format, size.width, size.height);

        Self {
            device,
            queue,
            size,
            format,
            mesh_pipeline_layout,
            mesh_pipelines: HashMap::new(),
            uniform_buffer,
            mesh_bind_group,
            geometries,
            program_handles: HashMap::new(),
            point_pipeline,
            point_uniform_buffer,
            point_bind_group,
            field_buffers: HashMap::new(),
            depth_texture,
            depth_view,
            post_processor,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.size.width && height == self.size.height {
            return;
        }
        self.size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let (depth_texture, depth_view) = create_depth_texture(&self.device, self.size);
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;
        self.post_processor.resize(&self.device, width, height);
    }

    fn ensure_pipeline(&mut self, program: ShaderProgram, blend_mode: BlendMode) {
        if self.mesh_pipelines.contains_key(&(program, blend_mode)) {
            return;
        }
        log::debug!("Creating mesh pipeline for {:?}/{:?}", program, blend_mode);
        let pipeline = pipeline::create_mesh_pipeline(
            &self.device,
            &self.mesh_pipeline_layout,
            self.format,
            program,
            blend_mode,
        );
        self.mesh_pipelines.insert((program, blend_mode), pipeline);
    }

    /// Compile the material's pipeline and hand out a stable handle for it.
    /// Pipeline creation is synchronous, so this never reports "not ready".
    pub fn program_handle(&mut self, material: &Material) -> UniformHandle {
        self.ensure_pipeline(material.program, material.blend_mode);
        let next = UniformHandle(self.program_handles.len() as u32);
        *self.program_handles.entry(material.id.clone()).or_insert(next)
    }

    /// Upload dirty particle fields. Buffers are only re-created when a
    /// field outgrows them.
    fn upload_fields(&mut self, batches: &[ParticleBatch<'_>]) {
        for batch in batches {
            let count = batch.positions.len() / 3;
            let stale = match self.field_buffers.get(&batch.slot) {
                Some(existing) => batch.dirty || existing.version != batch.version,
                None => true,
            };
            if !stale {
                continue;
            }

            let bytes: &[u8] = bytemuck::cast_slice(&batch.positions[..count * 3]);
            match self.field_buffers.get_mut(&batch.slot) {
                Some(existing) if existing.capacity >= count => {
                    self.queue.write_buffer(&existing.buffer, 0, bytes);
                    existing.count = count as u32;
                    existing.version = batch.version;
                }
                _ => {
                    log::debug!("Allocating particle buffer for field {} ({} points)", batch.slot, count);
                    let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("Particle Field {}", batch.slot)),
                        contents: bytes,
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    });
                    self.field_buffers.insert(
                        batch.slot,
                        FieldBuffer {
                            buffer,
                            capacity: count,
                            count: count as u32,
                            version: batch.version,
                        },
                    );
                }
            }
        }
    }

    /// Render one frame into `view`.
    pub fn render(&mut self, view: &wgpu::TextureView, frame: &FrameSubmission<'_>) {
        let aspect = self.size.width as f32 / self.size.height as f32;
        let camera = frame.camera.to_uniforms(aspect, frame.time);

        // Opaque first so blended shells test against finished depth
        let mut draws: Vec<&DrawItem> = frame.draws.iter().collect();
        draws.sort_by_key(|d| d.blend_mode != BlendMode::Opaque);
        if draws.len() > MAX_MESHES_PER_FRAME {
            log::warn!("Too many meshes ({} > {}), some will not be rendered", draws.len(), MAX_MESHES_PER_FRAME);
            draws.truncate(MAX_MESHES_PER_FRAME);
        }

        for draw in &draws {
            self.ensure_pipeline(draw.program, draw.blend_mode);
        }

        // All uniform writes happen before the pass is recorded
        for (i, draw) in draws.iter().enumerate() {
            let uniforms = ObjectUniforms::new(&camera, draw);
            self.queue.write_buffer(
                &self.uniform_buffer,
                (i * UNIFORM_ALIGNMENT) as u64,
                bytemuck::bytes_of(&uniforms),
            );
        }

        let batches = if frame.particles.len() > MAX_FIELDS_PER_FRAME {
            log::warn!("Too many particle fields ({} > {})", frame.particles.len(), MAX_FIELDS_PER_FRAME);
            &frame.particles[..MAX_FIELDS_PER_FRAME]
        } else {
            &frame.particles[..]
        };
        self.upload_fields(batches);
        for (i, batch) in batches.iter().enumerate() {
            let uniforms = PointUniforms {
                view_proj: camera.view_proj,
                color: batch.color,
                params: [batch.point_size, camera.time, 0.0, 0.0],
                _padding: [[0.0; 4]; 10],
            };
            self.queue.write_buffer(
                &self.point_uniform_buffer,
                (i * UNIFORM_ALIGNMENT) as u64,
                bytemuck::bytes_of(&uniforms),
            );
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let [r, g, b, a] = frame.clear_color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.post_processor.scene_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (i, draw) in draws.iter().enumerate() {
                let (Some(pipeline), Some(geometry)) = (
                    self.mesh_pipelines.get(&(draw.program, draw.blend_mode)),
                    self.geometries.get(&draw.geometry),
                ) else {
                    continue;
                };
                let offset = (i * UNIFORM_ALIGNMENT) as u32;
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.mesh_bind_group, &[offset]);
                render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                render_pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..geometry.num_indices, 0, 0..1);
            }

            render_pass.set_pipeline(&self.point_pipeline);
            for (i, batch) in batches.iter().enumerate() {
                let Some(field) = self.field_buffers.get(&batch.slot) else {
                    continue;
                };
                if field.count == 0 {
                    continue;
                }
                let offset = (i * UNIFORM_ALIGNMENT) as u32;
                render_pass.set_bind_group(0, &self.point_bind_group, &[offset]);
                render_pass.set_vertex_buffer(0, field.buffer.slice(..));
                render_pass.draw(0..field.count, 0..1);
            }
        }

        self.post_processor
            .process(&self.device, &mut encoder, &self.queue, view, &frame.post, frame.time);

        self.queue.submit(iter::once(encoder.finish()));
    }
}

fn create_mesh_geometry(device: &wgpu::Device, kind: GeometryKind, vertices: &[Vertex], indices: &[u16]) -> MeshGeometry {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", kind)),
        contents: bytemuck::cast_slice(vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", kind)),
        contents: bytemuck::cast_slice(indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    MeshGeometry {
        vertex_buffer,
        index_buffer,
        num_indices: indices.len() as u32,
    }
}

fn create_dynamic_uniform_layout(
    device: &wgpu::Device,
    label: &str,
    binding_size: u64,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(binding_size),
            },
            count: None,
        }],
    })
}

fn create_dynamic_uniform_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    binding_size: u64,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(binding_size),
            }),
        }],
    })
}

fn create_depth_texture(device: &wgpu::Device, size: wgpu::Extent3d) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniforms_fit_one_slot() {
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), UNIFORM_ALIGNMENT);
        assert_eq!(std::mem::size_of::<PointUniforms>(), UNIFORM_ALIGNMENT);
    }

    #[test]
    fn test_point_uniforms_cast_to_bytes() {
        let uniforms = PointUniforms {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            color: [0.4, 0.6, 1.0, 0.8],
            params: [2.0, 1.5, 0.0, 0.0],
            _padding: [[0.0; 4]; 10],
        };
        let bytes = bytemuck::bytes_of(&uniforms);
        assert_eq!(bytes.len(), UNIFORM_ALIGNMENT);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(&floats[16..24], &[0.4, 0.6, 1.0, 0.8, 2.0, 1.5, 0.0, 0.0]);
        assert!(floats[24..].iter().all(|f| *f == 0.0));
    }
}
