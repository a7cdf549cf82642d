//! Ray construction and ray/shape intersection for pointer picking.

use glam::{Quat, Vec3};

/// A half-line in world space. `direction` is kept normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Hit-test shape in object-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

impl Collider {
    /// Nearest non-negative ray parameter where `ray` enters this collider
    /// placed at `position`/`orientation`/`scale`. Rays starting inside report 0.
    pub fn intersect(&self, ray: &Ray, position: Vec3, orientation: Quat, scale: Vec3) -> Option<f32> {
        match *self {
            Collider::Sphere { radius } => {
                let r = radius * scale.abs().max_element();
                intersect_sphere(ray, position, r)
            }
            Collider::Box { half_extents } => {
                intersect_oriented_box(ray, position, orientation, half_extents * scale.abs())
            }
        }
    }
}

/// Ray/sphere test.
pub fn intersect_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t_near = -b - sqrt_disc;
    let t_far = -b + sqrt_disc;
    if t_far < 0.0 {
        return None;
    }
    Some(t_near.max(0.0))
}

/// Ray/oriented-box test. The ray is moved into box space and clipped against
/// the three slabs.
pub fn intersect_oriented_box(ray: &Ray, center: Vec3, orientation: Quat, half_extents: Vec3) -> Option<f32> {
    let inv = orientation.inverse();
    let origin = inv * (ray.origin - center);
    let direction = inv * ray.direction;

    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let h = half_extents[axis];

        if d.abs() < 1e-8 {
            // Parallel to this slab: must already be between its planes
            if o < -h || o > h {
                return None;
            }
            continue;
        }

        let inv_d = 1.0 / d;
        let mut t0 = (-h - o) * inv_d;
        let mut t1 = (h - o) * inv_d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        return None;
    }
    Some(t_min.max(0.0))
}
