//! Particle fields and their per-point kinematic rules.
//!
//! A field owns two equally sized buffers: the live positions uploaded to the
//! GPU and an immutable base pose sampled once at creation. Rules are closed
//! form in elapsed time and the base pose, so the same time always yields the
//! same buffer. The vent stream is the one exception: its height accumulates
//! and wraps under a ceiling.

use anyhow::{bail, ensure, Result};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Update rule for a particle field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Slow ambient wave. x/z oscillate around the base with a phase that
    /// depends on the base coordinate, y bobs at half speed.
    River {
        amplitude: f32,
        angular_speed: f32,
        wave_number: f32,
        vertical_amplitude: f32,
    },
    /// Upward stream recycled at `ceiling`. Height accumulates; x/z sway.
    VentStream { speed: f32, ceiling: f32, sway: f32 },
    /// Flocking-like oscillation around the base pose.
    Swarm { amplitude: f32, angular_speed: f32 },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::River { .. } => "river",
            FieldKind::VentStream { .. } => "vent_stream",
            FieldKind::Swarm { .. } => "swarm",
        }
    }
}

/// Parameters for one field as loaded from config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub count: usize,
    /// Centre of the sampling box.
    pub center: [f32; 3],
    /// Half extents of the sampling box.
    pub half_extents: [f32; 3],
    pub color: [f32; 4],
    pub point_size: f32,
}

/// Largest point count a single field may hold.
pub const MAX_FIELD_POINTS: usize = 1_000_000;

/// Largest sampling box half extent, in world units.
pub const MAX_HALF_EXTENT: f32 = 1.0e5;

impl FieldSpec {
    /// Check the spec can be sampled and simulated.
    pub fn validate(&self) -> Result<()> {
        let name = self.kind.name();
        ensure!(
            self.count <= MAX_FIELD_POINTS,
            "{} field count {} exceeds {}",
            name,
            self.count,
            MAX_FIELD_POINTS
        );
        for (axis, h) in self.half_extents.iter().enumerate() {
            ensure!(
                h.is_finite() && h.abs() <= MAX_HALF_EXTENT,
                "{} field half_extents[{}] = {} must be finite and at most {}",
                name,
                axis,
                h,
                MAX_HALF_EXTENT
            );
        }
        ensure!(
            self.center.iter().all(|c| c.is_finite()),
            "{} field center must be finite",
            name
        );
        if let FieldKind::VentStream { ceiling, .. } = self.kind {
            ensure!(
                ceiling.is_finite() && ceiling > 0.0,
                "vent ceiling must be positive, got {}",
                ceiling
            );
        }
        Ok(())
    }
}

/// Particle settings for both worlds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Seed for base-pose sampling; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub river: FieldSpec,
    pub vent: FieldSpec,
    pub swarm: FieldSpec,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        let ceiling = 12.0;
        Self {
            seed: None,
            river: FieldSpec {
                kind: FieldKind::River {
                    amplitude: 0.6,
                    angular_speed: 0.3,
                    wave_number: 0.2,
                    vertical_amplitude: 0.3,
                },
                count: 5000,
                center: [0.0, 0.0, 0.0],
                half_extents: [25.0, 25.0, 25.0],
                color: [0.7, 0.75, 1.0, 0.8],
                point_size: 2.0,
            },
            vent: FieldSpec {
                kind: FieldKind::VentStream {
                    speed: 2.5,
                    ceiling,
                    sway: 0.15,
                },
                count: 3000,
                center: [0.0, ceiling * 0.5, -4.0],
                half_extents: [1.2, ceiling * 0.5, 1.2],
                color: [1.0, 0.55, 0.25, 0.9],
                point_size: 2.5,
            },
            swarm: FieldSpec {
                kind: FieldKind::Swarm {
                    amplitude: 1.5,
                    angular_speed: 0.8,
                },
                count: 2000,
                center: [0.0, 2.0, 0.0],
                half_extents: [15.0, 7.5, 15.0],
                color: [0.35, 1.0, 0.85, 0.85],
                point_size: 1.8,
            },
        }
    }
}

impl ParticleConfig {
    pub fn validate(&self) -> Result<()> {
        self.river.validate()?;
        self.vent.validate()?;
        self.swarm.validate()
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// A fixed-size population of points.
#[derive(Clone, Debug)]
pub struct ParticleField {
    pub kind: FieldKind,
    pub color: [f32; 4],
    pub point_size: f32,
    positions: Vec<f32>,
    base: Vec<f32>,
    dirty: bool,
    version: u64,
}

impl ParticleField {
    /// Build a field from explicit buffers (xyz triples).
    pub fn from_buffers(kind: FieldKind, positions: Vec<f32>, base: Vec<f32>) -> Result<Self> {
        if positions.len() != base.len() {
            bail!(
                "{} field: position buffer has {} floats but base buffer has {}",
                kind.name(),
                positions.len(),
                base.len()
            );
        }
        if base.len() % 3 != 0 {
            bail!("{} field: buffer length {} is not a multiple of 3", kind.name(), base.len());
        }

        Ok(Self {
            kind,
            color: [1.0, 1.0, 1.0, 1.0],
            point_size: 2.0,
            positions,
            base,
            dirty: true,
            version: 0,
        })
    }

    /// Build a field whose live positions start at the base pose.
    pub fn from_base(kind: FieldKind, base: Vec<f32>) -> Result<Self> {
        Self::from_buffers(kind, base.clone(), base)
    }

    /// Sample `count` base points uniformly in an axis-aligned box.
    pub fn sample(kind: FieldKind, count: usize, center: Vec3, half_extents: Vec3, rng: &mut StdRng) -> Self {
        let mut base = Vec::with_capacity(count * 3);
        for _ in 0..count {
            for axis in 0..3 {
                let h = half_extents[axis].abs();
                // Scale a unit sample so huge extents can't overflow the range width
                let offset = if h > 0.0 { (rng.random::<f32>() * 2.0 - 1.0) * h } else { 0.0 };
                base.push(center[axis] + offset);
            }
        }

        if let FieldKind::VentStream { ceiling, .. } = kind {
            for y in base.iter_mut().skip(1).step_by(3) {
                *y = wrap_height(*y, ceiling);
            }
        }

        Self {
            kind,
            color: [1.0, 1.0, 1.0, 1.0],
            point_size: 2.0,
            positions: base.clone(),
            base,
            dirty: true,
            version: 0,
        }
    }

    /// Sample a field from its config entry.
    pub fn from_spec(spec: &FieldSpec, rng: &mut StdRng) -> Result<Self> {
        spec.validate()?;
        let mut field = Self::sample(
            spec.kind,
            spec.count,
            Vec3::from_array(spec.center),
            Vec3::from_array(spec.half_extents),
            rng,
        );
        field.color = spec.color;
        field.point_size = spec.point_size;
        Ok(field)
    }

    /// Apply this field's rule at elapsed time `time`, `dt` seconds after the
    /// previous update.
    pub fn update(&mut self, time: f32, dt: f32) {
        match self.kind {
            FieldKind::River {
                amplitude,
                angular_speed,
                wave_number,
                vertical_amplitude,
            } => {
                let phase = angular_speed * time;
                for (p, b) in self.positions.chunks_exact_mut(3).zip(self.base.chunks_exact(3)) {
                    p[0] = b[0] + amplitude * (phase + wave_number * b[0]).sin();
                    p[1] = b[1] + vertical_amplitude * (0.5 * phase + b[2]).sin();
                    p[2] = b[2] + amplitude * (phase + wave_number * b[2]).cos();
                }
            }
            FieldKind::Swarm { amplitude, angular_speed } => {
                let phase = angular_speed * time;
                for (p, b) in self.positions.chunks_exact_mut(3).zip(self.base.chunks_exact(3)) {
                    p[0] = b[0] + amplitude * (phase + b[1]).sin();
                    p[1] = b[1] + 0.5 * amplitude * (2.0 * phase + b[0]).sin();
                    p[2] = b[2] + amplitude * (phase + b[1]).cos();
                }
            }
            FieldKind::VentStream { speed, ceiling, sway } => {
                let rise = if dt.is_finite() && dt > 0.0 { dt * speed } else { 0.0 };
                for (p, b) in self.positions.chunks_exact_mut(3).zip(self.base.chunks_exact(3)) {
                    p[0] = b[0] + sway * (time + b[2]).sin();
                    p[1] = wrap_height(p[1] + rise, ceiling);
                    p[2] = b[2] + sway * (time + b[0]).cos();
                }
            }
        }

        self.dirty = true;
        self.version = self.version.wrapping_add(1);
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn base(&self) -> &[f32] {
        &self.base
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.base.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<Vec3> {
        self.positions
            .get(index * 3..index * 3 + 3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
    }

    /// Whether positions changed since the renderer last uploaded them.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called by the renderer after uploading.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Increments on every update.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Wrap a height into `[0, ceiling)`.
pub fn wrap_height(y: f32, ceiling: f32) -> f32 {
    if !ceiling.is_finite() || ceiling <= 0.0 || !y.is_finite() {
        return 0.0;
    }
    let wrapped = y.rem_euclid(ceiling);
    // rem_euclid can round up to exactly `ceiling` for tiny negative inputs
    if wrapped >= ceiling || wrapped < 0.0 {
        0.0
    } else {
        wrapped
    }
}
