use bytemuck::{Pod, Zeroable};
use std::f32::consts::{PI, TAU};

use crate::scene_graph::GeometryKind;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12, // [f32; 3] is 12 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Geometry for a built-in shape, unit sized (fits in a 1x1x1 box).
pub fn create_geometry(kind: GeometryKind) -> (Vec<Vertex>, Vec<u16>) {
    match kind {
        GeometryKind::Sphere => create_sphere_geometry(),
        GeometryKind::Cube => create_cube_geometry(),
        GeometryKind::Torus => create_torus_geometry(),
        GeometryKind::Plane => create_plane_geometry(),
    }
}

pub fn create_cube_geometry() -> (Vec<Vertex>, Vec<u16>) {
    // (normal, u axis, v axis) per face, u x v = normal
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (n, u, v) in faces {
        let base = vertices.len() as u16;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = [
                n[0] * 0.5 + u[0] * su + v[0] * sv,
                n[1] * 0.5 + u[1] * su + v[1] * sv,
                n[2] * 0.5 + u[2] * su + v[2] * sv,
            ];
            vertices.push(Vertex::new(position, n));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    (vertices, indices)
}

/// Create a unit plane in the XZ plane (Y up), centered at origin.
pub fn create_plane_geometry() -> (Vec<Vertex>, Vec<u16>) {
    let up = [0.0, 1.0, 0.0];
    let vertices = vec![
        Vertex::new([-0.5, 0.0, 0.5], up),
        Vertex::new([0.5, 0.0, 0.5], up),
        Vertex::new([0.5, 0.0, -0.5], up),
        Vertex::new([-0.5, 0.0, -0.5], up),
    ];

    let indices = vec![0, 1, 2, 2, 3, 0];

    (vertices, indices)
}

/// Create a UV sphere centered at origin with radius 0.5.
/// Uses 24 latitude rings and 48 longitude segments.
pub fn create_sphere_geometry() -> (Vec<Vertex>, Vec<u16>) {
    let lat_segments = 24;
    let lon_segments = 48;
    let radius = 0.5;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for lat in 0..=lat_segments {
        let theta = PI * (lat as f32) / (lat_segments as f32);
        let (sin_theta, cos_theta) = theta.sin_cos();

        for lon in 0..=lon_segments {
            let phi = TAU * (lon as f32) / (lon_segments as f32);
            let (sin_phi, cos_phi) = phi.sin_cos();

            let normal = [cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];
            let position = [normal[0] * radius, normal[1] * radius, normal[2] * radius];
            vertices.push(Vertex::new(position, normal));
        }
    }

    for lat in 0..lat_segments {
        for lon in 0..lon_segments {
            let first = (lat * (lon_segments + 1) + lon) as u16;
            let second = first + lon_segments as u16 + 1;

            indices.extend_from_slice(&[first, first + 1, second]);
            indices.extend_from_slice(&[second, first + 1, second + 1]);
        }
    }

    (vertices, indices)
}

/// Torus in the XZ plane with outer radius 0.5.
pub fn create_torus_geometry() -> (Vec<Vertex>, Vec<u16>) {
    let major_segments = 64;
    let minor_segments = 16;
    let tube = 0.08;
    let major = 0.5 - tube;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for i in 0..=major_segments {
        let u = TAU * i as f32 / major_segments as f32;
        let (sin_u, cos_u) = u.sin_cos();
        for j in 0..=minor_segments {
            let v = TAU * j as f32 / minor_segments as f32;
            let (sin_v, cos_v) = v.sin_cos();

            let normal = [cos_u * cos_v, sin_v, sin_u * cos_v];
            let ring = major + tube * cos_v;
            let position = [ring * cos_u, tube * sin_v, ring * sin_u];
            vertices.push(Vertex::new(position, normal));
        }
    }

    for i in 0..major_segments {
        for j in 0..minor_segments {
            let a = (i * (minor_segments + 1) + j) as u16;
            let b = a + minor_segments as u16 + 1;
            indices.extend_from_slice(&[a, b, a + 1]);
            indices.extend_from_slice(&[b, b + 1, a + 1]);
        }
    }

    (vertices, indices)
}
