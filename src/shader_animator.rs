//! Per-frame uniform feeding for animated materials.
//!
//! The animator owns the scene clock. Every frame it advances the clock, then
//! writes a fresh [`ShaderState`] for each animated material whose program the
//! render backend has made available. A material whose program isn't ready yet
//! is skipped for that frame and asked about again on the next one.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::material::{MaterialId, MaterialRegistry};
use crate::render::RenderBackend;

/// Backend-issued handle to a material's uniform slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformHandle(pub u32);

/// Per-material uniform values written once per frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ShaderState {
    /// Elapsed scene time in seconds.
    pub time: f32,
    /// Sinusoidal pulse in [0, 1].
    pub pulse: f32,
    /// Vertical bob offset in world units.
    pub bob: f32,
    /// Vertex displacement amplitude.
    pub displacement: f32,
    /// Baseline glow intensity.
    pub glow: f32,
    pub _padding: [f32; 3],
}

/// Tuning for host-side derived scalars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Pulse angular speed in radians per second.
    pub pulse_speed: f32,
    /// Bob angular speed in radians per second.
    pub bob_speed: f32,
    pub bob_amplitude: f32,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            pulse_speed: 2.0,
            bob_speed: 1.2,
            bob_amplitude: 0.15,
        }
    }
}

impl ShaderConfig {
    pub fn pulse(&self, time: f32) -> f32 {
        0.5 + 0.5 * (time * self.pulse_speed).sin()
    }

    pub fn bob(&self, time: f32) -> f32 {
        self.bob_amplitude * (time * self.bob_speed).sin()
    }
}

pub struct ShaderAnimator {
    elapsed: f32,
    config: ShaderConfig,
    handles: HashMap<MaterialId, UniformHandle>,
    states: HashMap<MaterialId, ShaderState>,
}

impl ShaderAnimator {
    pub fn new(config: ShaderConfig) -> Self {
        Self {
            elapsed: 0.0,
            config,
            handles: HashMap::new(),
            states: HashMap::new(),
        }
    }

    /// Advance the clock by `dt` and return the new elapsed time.
    ///
    /// The clock never runs backwards; negative or non-finite deltas count as 0.
    pub fn advance(&mut self, dt: f32) -> f32 {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        self.elapsed
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn config(&self) -> &ShaderConfig {
        &self.config
    }

    /// Write uniforms for every animated material at time `now`.
    ///
    /// Returns how many materials were written this frame.
    pub fn update(&mut self, now: f32, materials: &MaterialRegistry, backend: &mut dyn RenderBackend) -> usize {
        let pulse = self.config.pulse(now);
        let bob = self.config.bob(now);
        let mut written = 0;

        for material in materials.animated() {
            if !self.handles.contains_key(&material.id) {
                match backend.program_handle(material) {
                    Some(handle) => {
                        log::debug!("Captured uniform handle {:?} for material '{}'", handle, material.id);
                        self.handles.insert(material.id.clone(), handle);
                    }
                    None => continue,
                }
            }

            self.states.insert(
                material.id.clone(),
                ShaderState {
                    time: now,
                    pulse,
                    bob,
                    displacement: material.displacement,
                    glow: material.glow_intensity,
                    _padding: [0.0; 3],
                },
            );
            written += 1;
        }

        written
    }

    pub fn handle(&self, material: &str) -> Option<UniformHandle> {
        self.handles.get(material).copied()
    }

    pub fn state(&self, material: &str) -> Option<&ShaderState> {
        self.states.get(material)
    }

    /// True once every animated material has a captured handle.
    pub fn all_captured(&self, materials: &MaterialRegistry) -> bool {
        materials.animated().all(|m| self.handles.contains_key(&m.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;

    #[test]
    fn test_clock_is_monotonic() {
        let mut animator = ShaderAnimator::new(ShaderConfig::default());
        assert_eq!(animator.advance(0.5), 0.5);
        assert_eq!(animator.advance(-1.0), 0.5);
        assert_eq!(animator.advance(f32::NAN), 0.5);
        assert_eq!(animator.advance(0.25), 0.75);
    }

    #[test]
    fn test_pulse_stays_in_unit_range() {
        let config = ShaderConfig::default();
        for i in 0..1000 {
            let p = config.pulse(i as f32 * 0.037);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_materials_skipped_until_program_ready() {
        let materials = MaterialRegistry::new();
        let mut backend = HeadlessBackend::with_program_delay(2);
        let mut animator = ShaderAnimator::new(ShaderConfig::default());

        let now = animator.advance(1.0 / 60.0);
        assert_eq!(animator.update(now, &materials, &mut backend), 0);
        assert!(animator.state("dream_core").is_none());
        backend.finish_frame();

        let now = animator.advance(1.0 / 60.0);
        assert_eq!(animator.update(now, &materials, &mut backend), 0);
        backend.finish_frame();

        let now = animator.advance(1.0 / 60.0);
        let animated = materials.animated().count();
        assert_eq!(animator.update(now, &materials, &mut backend), animated);
        assert!(animator.all_captured(&materials));

        let state = animator.state("dream_core").unwrap();
        assert_eq!(state.time, now);
        assert_eq!(state.displacement, 0.25);
    }

    #[test]
    fn test_plain_materials_never_written() {
        let materials = MaterialRegistry::new();
        let mut backend = HeadlessBackend::new();
        let mut animator = ShaderAnimator::new(ShaderConfig::default());
        animator.update(0.1, &materials, &mut backend);

        assert!(animator.state("plain").is_none());
        assert!(animator.handle("plain").is_none());
        assert!(animator.handle("lens_glow").is_some());
    }

    #[test]
    fn test_time_written_every_frame() {
        let materials = MaterialRegistry::new();
        let mut backend = HeadlessBackend::new();
        let mut animator = ShaderAnimator::new(ShaderConfig::default());

        for _ in 0..5 {
            let now = animator.advance(0.1);
            animator.update(now, &materials, &mut backend);
            assert_eq!(animator.state("lens_glow").unwrap().time, now);
        }
    }
}
