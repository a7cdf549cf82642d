//! The render backend seam.
//!
//! The frame driver never talks to a GPU directly. Each tick it builds a
//! [`FrameSubmission`] and hands it to whatever [`RenderBackend`] the host
//! plugged in: the wgpu renderer in `gpu/`, or [`HeadlessBackend`] for
//! simulation runs and tests.

use std::collections::HashMap;

use glam::Mat4;
use serde::Serialize;

use crate::camera::Camera;
use crate::material::{BlendMode, Material, MaterialId, ShaderProgram};
use crate::post_processing::PostStage;
use crate::scene_graph::{GeometryKind, ObjectId};
use crate::shader_animator::{ShaderState, UniformHandle};

/// One drawable object for this frame.
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub object: ObjectId,
    pub geometry: GeometryKind,
    pub material: MaterialId,
    pub program: ShaderProgram,
    pub blend_mode: BlendMode,
    pub model: Mat4,
    /// Latest uniforms for the material; default for plain materials.
    pub shader: ShaderState,
    pub base_color: [f32; 4],
    pub glow_color: [f32; 4],
    /// Per-object glow, including hover easing.
    pub glow: f32,
}

/// A particle field's buffer for this frame.
#[derive(Clone, Copy, Debug)]
pub struct ParticleBatch<'a> {
    /// Stable index of the field within the world.
    pub slot: usize,
    /// xyz triples.
    pub positions: &'a [f32],
    /// True if positions changed since the last upload.
    pub dirty: bool,
    pub version: u64,
    pub color: [f32; 4],
    pub point_size: f32,
}

/// Everything the backend needs to present one frame.
#[derive(Clone, Debug)]
pub struct FrameSubmission<'a> {
    /// Elapsed scene time sampled for this frame.
    pub time: f32,
    pub camera: Camera,
    pub draws: Vec<DrawItem>,
    pub particles: Vec<ParticleBatch<'a>>,
    /// Post stages in application order.
    pub post: Vec<PostStage>,
    /// Interactive surface opacity in [0, 1].
    pub surface_opacity: f32,
    pub clear_color: [f32; 4],
}

/// Capability the frame driver renders through.
pub trait RenderBackend {
    /// Uniform handle for a material's program, or `None` while the program
    /// is still being prepared.
    fn program_handle(&mut self, material: &Material) -> Option<UniformHandle>;

    /// Draw and present a frame. Fire-and-forget.
    fn present(&mut self, frame: &FrameSubmission<'_>);
}

/// Owned summary of a presented frame.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameRecord {
    pub time: f32,
    pub camera_target: [f32; 3],
    pub draws: Vec<DrawRecord>,
    /// Point count per particle batch.
    pub particle_points: Vec<usize>,
    /// Batches flagged for re-upload.
    pub dirty_batches: usize,
    pub post: Vec<String>,
    pub surface_opacity: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct DrawRecord {
    pub object: u32,
    pub material: MaterialId,
    pub position: [f32; 3],
    pub glow: f32,
}

/// GPU-less backend that records what it is given.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    /// Frames to wait before programs report ready.
    program_delay: u64,
    frames: u64,
    handles: HashMap<MaterialId, UniformHandle>,
    last: Option<FrameRecord>,
    uploads: u64,
}

impl HeadlessBackend {
    /// Backend whose programs are ready immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose programs become ready after `frames` presented frames.
    pub fn with_program_delay(frames: u64) -> Self {
        Self {
            program_delay: frames,
            ..Default::default()
        }
    }

    /// Count a frame as finished without recording anything.
    pub fn finish_frame(&mut self) {
        self.frames += 1;
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.last.as_ref()
    }

    /// Total particle batch uploads requested so far.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }
}

impl RenderBackend for HeadlessBackend {
    fn program_handle(&mut self, material: &Material) -> Option<UniformHandle> {
        if self.frames < self.program_delay {
            return None;
        }
        let next = UniformHandle(self.handles.len() as u32);
        Some(*self.handles.entry(material.id.clone()).or_insert(next))
    }

    fn present(&mut self, frame: &FrameSubmission<'_>) {
        let dirty = frame.particles.iter().filter(|b| b.dirty).count();
        self.uploads += dirty as u64;

        self.last = Some(FrameRecord {
            time: frame.time,
            camera_target: frame.camera.target.to_array(),
            draws: frame
                .draws
                .iter()
                .map(|d| DrawRecord {
                    object: d.object.0,
                    material: d.material.clone(),
                    position: d.model.w_axis.truncate().to_array(),
                    glow: d.glow,
                })
                .collect(),
            particle_points: frame.particles.iter().map(|b| b.positions.len() / 3).collect(),
            dirty_batches: dirty,
            post: frame.post.iter().map(|s| s.effect_id.clone()).collect(),
            surface_opacity: frame.surface_opacity,
        });
        self.finish_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialRegistry;

    #[test]
    fn test_program_delay() {
        let materials = MaterialRegistry::new();
        let core = materials.get("dream_core").unwrap();
        let mut backend = HeadlessBackend::with_program_delay(1);

        assert!(backend.program_handle(&core).is_none());
        backend.finish_frame();
        let handle = backend.program_handle(&core).unwrap();
        assert_eq!(backend.program_handle(&core), Some(handle));
    }

    #[test]
    fn test_present_records_summary() {
        let mut backend = HeadlessBackend::new();
        let positions = vec![0.0; 9];
        let frame = FrameSubmission {
            time: 1.5,
            camera: Camera::default(),
            draws: Vec::new(),
            particles: vec![ParticleBatch {
                slot: 0,
                positions: &positions,
                dirty: true,
                version: 1,
                color: [1.0; 4],
                point_size: 2.0,
            }],
            post: Vec::new(),
            surface_opacity: 0.5,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        };
        backend.present(&frame);

        let record = backend.last_frame().unwrap();
        assert_eq!(record.time, 1.5);
        assert_eq!(record.particle_points, vec![3]);
        assert_eq!(record.dirty_batches, 1);
        assert_eq!(backend.frames_presented(), 1);
        assert_eq!(backend.uploads(), 1);
    }
}
