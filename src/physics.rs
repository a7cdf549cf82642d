//! Minimal rigid-body world and the bridge that keeps floating objects adrift.
//!
//! The [`PhysicsBackend`] trait is the narrow seam to whatever integrator is
//! in use. [`RigidBodyWorld`] is the built-in one: forces in, semi-implicit
//! Euler out, no gravity and no contacts. [`PhysicsBridge`] owns a backend,
//! steps it on a fixed clock, injects the ambient drift force and copies body
//! poses back onto their visual objects.

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::scene_graph::SceneRegistry;

/// Handle to a body owned by a physics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u32);

/// Collision shape descriptor handed to the backend. `RigidBodyWorld` has
/// no contacts, so it integrates from mass alone and does not keep it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

/// Position and orientation of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self { position, orientation }
    }

    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

/// The physics capability the bridge talks to.
pub trait PhysicsBackend {
    fn create_body(&mut self, shape: BodyShape, mass: f32, pose: Pose) -> BodyHandle;
    /// Accumulate a force at the body's center for the next step.
    fn apply_force(&mut self, body: BodyHandle, force: Vec3);
    fn set_angular_velocity(&mut self, body: BodyHandle, angular_velocity: Vec3);
    fn step(&mut self, dt: f32);
    fn pose(&self, body: BodyHandle) -> Option<Pose>;
    fn bodies(&self) -> Vec<BodyHandle>;
}

#[derive(Debug, Clone)]
struct RigidBody {
    inv_mass: f32,
    position: Vec3,
    orientation: Quat,
    velocity: Vec3,
    angular_velocity: Vec3,
    force: Vec3,
}

/// Built-in force integrator.
#[derive(Debug, Clone)]
pub struct RigidBodyWorld {
    bodies: Vec<RigidBody>,
    /// Fraction of linear velocity lost per second.
    pub linear_damping: f32,
    /// Fraction of angular velocity lost per second.
    pub angular_damping: f32,
}

impl RigidBodyWorld {
    pub fn new(linear_damping: f32, angular_damping: f32) -> Self {
        Self {
            bodies: Vec::new(),
            linear_damping: linear_damping.clamp(0.0, 1.0),
            angular_damping: angular_damping.clamp(0.0, 1.0),
        }
    }

    pub fn velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.bodies.get(body.0 as usize).map(|b| b.velocity)
    }
}

impl Default for RigidBodyWorld {
    fn default() -> Self {
        Self::new(0.01, 0.01)
    }
}

impl PhysicsBackend for RigidBodyWorld {
    fn create_body(&mut self, _shape: BodyShape, mass: f32, pose: Pose) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.bodies.push(RigidBody {
            inv_mass,
            position: pose.position,
            orientation: pose.orientation,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
        });
        handle
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3) {
        if let Some(b) = self.bodies.get_mut(body.0 as usize) {
            b.force += force;
        }
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, angular_velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(body.0 as usize) {
            b.angular_velocity = angular_velocity;
        }
    }

    fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let linear_keep = (1.0 - self.linear_damping).powf(dt);
        let angular_keep = (1.0 - self.angular_damping).powf(dt);

        for b in &mut self.bodies {
            // Static bodies (zero inverse mass) ignore forces
            b.velocity += b.force * b.inv_mass * dt;
            b.velocity *= linear_keep;
            b.position += b.velocity * dt;

            b.angular_velocity *= angular_keep;
            let spin = b.angular_velocity * dt;
            if spin.length_squared() > 0.0 {
                b.orientation = (Quat::from_scaled_axis(spin) * b.orientation).normalize();
            }

            b.force = Vec3::ZERO;
        }
    }

    fn pose(&self, body: BodyHandle) -> Option<Pose> {
        self.bodies
            .get(body.0 as usize)
            .map(|b| Pose::new(b.position, b.orientation))
    }

    fn bodies(&self) -> Vec<BodyHandle> {
        (0..self.bodies.len() as u32).map(BodyHandle).collect()
    }
}

/// Source of drift samples in [-1, 1].
pub trait DriftSource {
    fn next_unit(&mut self) -> f32;
}

/// Uniform drift from a seedable RNG.
pub struct RandomDrift {
    rng: StdRng,
}

impl RandomDrift {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl DriftSource for RandomDrift {
    fn next_unit(&mut self) -> f32 {
        self.rng.random_range(-1.0..=1.0)
    }
}

/// Cycles through a fixed list of samples.
pub struct SequenceDrift {
    values: Vec<f32>,
    cursor: usize,
}

impl SequenceDrift {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, cursor: 0 }
    }
}

impl DriftSource for SequenceDrift {
    fn next_unit(&mut self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor = self.cursor.wrapping_add(1);
        v.clamp(-1.0, 1.0)
    }
}

/// Physics tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed integration step in seconds.
    pub fixed_step: f32,
    /// Upper bound on integration steps per frame.
    pub max_substeps: u32,
    /// Per-axis bound of the ambient drift force.
    pub drift_magnitude: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Seed for the drift source; `None` draws from OS entropy.
    pub drift_seed: Option<u64>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 60.0,
            max_substeps: 3,
            drift_magnitude: 0.05,
            linear_damping: 0.01,
            angular_damping: 0.01,
            drift_seed: None,
        }
    }
}

/// Owns the physics backend and keeps linked visual objects in sync with it.
pub struct PhysicsBridge {
    backend: Box<dyn PhysicsBackend>,
    drift: Box<dyn DriftSource>,
    config: PhysicsConfig,
    accumulator: f32,
}

impl PhysicsBridge {
    pub fn new(backend: Box<dyn PhysicsBackend>, drift: Box<dyn DriftSource>, config: PhysicsConfig) -> Self {
        Self {
            backend,
            drift,
            config,
            accumulator: 0.0,
        }
    }

    /// Bridge over the built-in world with a random drift source.
    pub fn with_defaults(config: PhysicsConfig) -> Self {
        let world = RigidBodyWorld::new(config.linear_damping, config.angular_damping);
        let drift = match config.drift_seed {
            Some(seed) => RandomDrift::seeded(seed),
            None => RandomDrift::from_entropy(),
        };
        Self::new(Box::new(world), Box::new(drift), config)
    }

    pub fn set_drift_source(&mut self, drift: Box<dyn DriftSource>) {
        self.drift = drift;
    }

    pub fn create_body(&mut self, shape: BodyShape, mass: f32, pose: Pose) -> BodyHandle {
        self.backend.create_body(shape, mass, pose)
    }

    pub fn set_spin(&mut self, body: BodyHandle, angular_velocity: Vec3) {
        self.backend.set_angular_velocity(body, angular_velocity);
    }

    pub fn backend(&self) -> &dyn PhysicsBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Advance by `dt` seconds of wall-clock time, apply drift, sync poses.
    ///
    /// Returns the number of fixed steps taken.
    pub fn step(&mut self, dt: f32, scene: &mut SceneRegistry) -> u32 {
        let steps = self.integrate(dt);
        self.apply_drift();
        self.sync(scene);
        steps
    }

    fn integrate(&mut self, dt: f32) -> u32 {
        let fixed = self.config.fixed_step;
        if fixed <= 0.0 || !dt.is_finite() || dt <= 0.0 {
            return 0;
        }

        self.accumulator += dt;
        let mut steps = 0;
        // Small tolerance so a frame of exactly one fixed step isn't lost to rounding
        while self.accumulator + 1e-6 >= fixed && steps < self.config.max_substeps {
            self.backend.step(fixed);
            self.accumulator -= fixed;
            steps += 1;
        }

        if self.accumulator + 1e-6 >= fixed {
            log::debug!(
                "Physics fell behind by {:.4}s; dropping backlog after {} substeps",
                self.accumulator,
                steps
            );
            self.accumulator = 0.0;
        }
        self.accumulator = self.accumulator.max(0.0);
        steps
    }

    fn apply_drift(&mut self) {
        let magnitude = self.config.drift_magnitude;
        for body in self.backend.bodies() {
            let force = Vec3::new(
                self.drift.next_unit() * magnitude,
                self.drift.next_unit() * magnitude,
                self.drift.next_unit() * magnitude,
            );
            self.backend.apply_force(body, force);
        }
    }

    /// Copy body poses onto linked objects. Never reads object transforms back.
    fn sync(&self, scene: &mut SceneRegistry) {
        for object in scene.iter_mut() {
            let Some(body) = object.body else { continue };
            if let Some(pose) = self.backend.pose(body) {
                object.transform.position = pose.position;
                object.transform.orientation = pose.orientation;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{GeometryKind, ObjectDesc, Transform};

    fn bridge_with(values: Vec<f32>) -> PhysicsBridge {
        let config = PhysicsConfig::default();
        PhysicsBridge::new(
            Box::new(RigidBodyWorld::new(config.linear_damping, config.angular_damping)),
            Box::new(SequenceDrift::new(values)),
            config,
        )
    }

    #[test]
    fn test_constant_force_integration() {
        let mut world = RigidBodyWorld::new(0.0, 0.0);
        let body = world.create_body(BodyShape::Sphere { radius: 1.0 }, 2.0, Pose::at(Vec3::ZERO));
        world.apply_force(body, Vec3::new(4.0, 0.0, 0.0));
        world.step(0.5);

        // a = 2, v = 1, x = v * dt (semi-implicit)
        assert!((world.velocity(body).unwrap().x - 1.0).abs() < 1e-6);
        assert!((world.pose(body).unwrap().position.x - 0.5).abs() < 1e-6);

        // Force is cleared after the step
        world.step(0.5);
        assert!((world.velocity(body).unwrap().x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_integration_depends_on_mass_not_shape() {
        let mut world = RigidBodyWorld::default();
        let ball = world.create_body(BodyShape::Sphere { radius: 0.2 }, 2.0, Pose::at(Vec3::ZERO));
        let crate_box = world.create_body(
            BodyShape::Box { half_extents: Vec3::splat(3.0) },
            2.0,
            Pose::at(Vec3::ZERO),
        );
        for _ in 0..30 {
            world.apply_force(ball, Vec3::new(0.1, 0.0, -0.05));
            world.apply_force(crate_box, Vec3::new(0.1, 0.0, -0.05));
            world.step(1.0 / 60.0);
        }
        assert_eq!(world.pose(ball), world.pose(crate_box));
        assert_eq!(world.velocity(ball), world.velocity(crate_box));
    }

    #[test]
    fn test_zero_mass_is_static() {
        let mut world = RigidBodyWorld::default();
        let body = world.create_body(BodyShape::Box { half_extents: Vec3::ONE }, 0.0, Pose::at(Vec3::Y));
        world.apply_force(body, Vec3::splat(100.0));
        world.step(1.0);
        assert_eq!(world.pose(body).unwrap().position, Vec3::Y);
    }

    #[test]
    fn test_substeps_are_clamped() {
        let mut bridge = bridge_with(vec![0.0]);
        let mut scene = SceneRegistry::new();

        // One second of backlog must not run sixty steps in one call
        assert_eq!(bridge.step(1.0, &mut scene), 3);
        // The backlog was dropped, so the next normal frame runs a single step
        assert_eq!(bridge.step(1.0 / 60.0, &mut scene), 1);
    }

    #[test]
    fn test_small_frames_accumulate() {
        let mut bridge = bridge_with(vec![0.0]);
        let mut scene = SceneRegistry::new();
        assert_eq!(bridge.step(1.0 / 120.0, &mut scene), 0);
        assert_eq!(bridge.step(1.0 / 120.0, &mut scene), 1);
    }

    #[test]
    fn test_drift_moves_linked_object_one_way() {
        let mut bridge = bridge_with(vec![1.0, -1.0, 0.5]);
        let mut scene = SceneRegistry::new();
        let id = scene.insert(
            ObjectDesc::new("orb", GeometryKind::Sphere, "plain")
                .transform(Transform::from_position(Vec3::ZERO)),
        );
        let body = bridge.create_body(BodyShape::Sphere { radius: 0.5 }, 1.0, Pose::at(Vec3::ZERO));
        scene.link_body(id, body);

        for _ in 0..10 {
            bridge.step(1.0 / 60.0, &mut scene);
        }
        let p = scene.get(id).unwrap().transform.position;
        assert!(p.x > 0.0);
        assert!(p.y < 0.0);
        assert!(p.z > 0.0);

        // Editing the visual transform must not feed back into the body
        scene.get_mut(id).unwrap().transform.position = Vec3::splat(100.0);
        bridge.step(1.0 / 60.0, &mut scene);
        assert!(scene.get(id).unwrap().transform.position.x < 1.0);
    }

    #[test]
    fn test_sequence_drift_clamps_and_cycles() {
        let mut drift = SequenceDrift::new(vec![2.0, -0.5]);
        assert_eq!(drift.next_unit(), 1.0);
        assert_eq!(drift.next_unit(), -0.5);
        assert_eq!(drift.next_unit(), 1.0);
        assert_eq!(SequenceDrift::new(vec![]).next_unit(), 0.0);
    }

    #[test]
    fn test_random_drift_is_bounded_and_seeded() {
        let mut a = RandomDrift::seeded(7);
        let mut b = RandomDrift::seeded(7);
        for _ in 0..1000 {
            let v = a.next_unit();
            assert!((-1.0..=1.0).contains(&v));
            assert_eq!(v, b.next_unit());
        }
    }
}
