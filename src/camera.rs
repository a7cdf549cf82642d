//! Look-at camera and pointer ray construction.
//!
//! The camera always looks at a target point; focus transitions move that
//! target while the eye stays put.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::raycast::Ray;

/// Camera settings, loadable from config.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Eye position in world space.
    pub position: [f32; 3],
    /// Initial look-at target.
    pub target: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 3.0, 14.0],
            target: [0.0, 0.0, 0.0],
            fov: 60.0,
            near: 0.1,
            far: 200.0,
        }
    }
}

/// A perspective look-at camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            position: Vec3::from_array(config.position),
            target: Vec3::from_array(config.target),
            up: Vec3::Y,
            fov: config.fov,
            near: config.near,
            far: config.far,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect.max(1e-4), self.near, self.far)
    }

    pub fn view_projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Ray from the eye through a point in normalized device coordinates
    /// (x right, y up, both in [-1, 1]).
    pub fn ray_from_ndc(&self, ndc: Vec2, aspect: f32) -> Ray {
        let inv = self.view_projection_matrix(aspect).inverse();
        // wgpu clip space has depth in [0, 1]
        let near = inv.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inv.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        Ray::new(self.position, far - near)
    }

    /// Evaluate into GPU-ready uniforms.
    pub fn to_uniforms(&self, aspect: f32, time: f32) -> CameraUniforms {
        CameraUniforms {
            view_proj: self.view_projection_matrix(aspect).to_cols_array_2d(),
            position: [self.position.x, self.position.y, self.position.z, 1.0],
            target: [self.target.x, self.target.y, self.target.z, 1.0],
            time,
            _padding: [0.0; 3],
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// Evaluated camera parameters ready for GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Eye position (vec4, w unused).
    pub position: [f32; 4],
    /// Look-at target (vec4, w unused).
    pub target: [f32; 4],
    /// Elapsed scene time in seconds.
    pub time: f32,
    pub _padding: [f32; 3],
}

impl CameraUniforms {
    pub fn target_vec3(&self) -> Vec3 {
        Vec3::new(self.target[0], self.target[1], self.target[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size() {
        // Ensure proper alignment for GPU
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 112);
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = Camera {
            position: Vec3::new(0.0, 3.0, 14.0),
            target: Vec3::new(0.0, 1.0, 0.0),
            ..Default::default()
        };
        let ray = camera.ray_from_ndc(Vec2::ZERO, 16.0 / 9.0);
        let expected = (camera.target - camera.position).normalize();

        assert!((ray.direction - expected).length() < 1e-4);
        assert_eq!(ray.origin, camera.position);
    }

    #[test]
    fn test_right_edge_ray_leans_right() {
        let camera = Camera::default();
        let ray = camera.ray_from_ndc(Vec2::new(1.0, 0.0), 1.0);
        assert!(ray.direction.x > 0.0);

        let up = camera.ray_from_ndc(Vec2::new(0.0, 1.0), 1.0);
        let center = camera.ray_from_ndc(Vec2::ZERO, 1.0);
        assert!(up.direction.y > center.direction.y);
    }

    #[test]
    fn test_view_matrix_puts_target_in_front() {
        let camera = Camera::default();
        let target_in_view = camera.view_matrix().transform_point3(camera.target);
        assert!(target_in_view.z < 0.0);
    }
}
