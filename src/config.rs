//! Runtime configuration.
//!
//! Every section has built-in defaults, so a config file only needs the
//! values it wants to change.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::easing::EasingFunction;
use crate::interaction::HoverConfig;
use crate::particle::ParticleConfig;
use crate::physics::PhysicsConfig;
use crate::shader_animator::ShaderConfig;

/// Camera focus transition settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Fixed wall-clock duration of every focus transition.
    pub duration_secs: f32,
    pub easing: EasingFunction,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 1.5,
            easing: EasingFunction::CubicInOut,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DreamConfig {
    pub physics: PhysicsConfig,
    pub transition: TransitionConfig,
    pub hover: HoverConfig,
    pub shader: ShaderConfig,
    pub camera: CameraConfig,
    pub particles: ParticleConfig,
    /// Duration of the surface fade-in once content is ready.
    pub fade_in_secs: f32,
}

impl Default for DreamConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            transition: TransitionConfig::default(),
            hover: HoverConfig::default(),
            shader: ShaderConfig::default(),
            camera: CameraConfig::default(),
            particles: ParticleConfig::default(),
            fade_in_secs: 1.2,
        }
    }
}

impl DreamConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse dreamscape config")?;
        config.validated()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Reject values the frame loop can't work with.
    fn validated(self) -> Result<Self> {
        anyhow::ensure!(
            self.physics.fixed_step > 0.0 && self.physics.fixed_step.is_finite(),
            "physics.fixed_step must be positive, got {}",
            self.physics.fixed_step
        );
        anyhow::ensure!(self.physics.max_substeps > 0, "physics.max_substeps must be at least 1");
        anyhow::ensure!(
            self.transition.duration_secs >= 0.0,
            "transition.duration_secs must not be negative"
        );
        anyhow::ensure!(self.fade_in_secs >= 0.0, "fade_in_secs must not be negative");
        self.particles.validate().context("Invalid particles section")?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = DreamConfig::from_json("{}").unwrap();
        assert_eq!(config.transition.duration_secs, 1.5);
        assert_eq!(config.physics.max_substeps, 3);
        assert_eq!(config.fade_in_secs, 1.2);
        assert_eq!(config.hover.hovered_glow, 1.0);
    }

    #[test]
    fn test_partial_override() {
        let config = DreamConfig::from_json(
            r#"{ "transition": { "duration_secs": 2.0 }, "particles": { "seed": 42 } }"#,
        )
        .unwrap();
        assert_eq!(config.transition.duration_secs, 2.0);
        assert_eq!(config.transition.easing, EasingFunction::CubicInOut);
        assert_eq!(config.particles.seed, Some(42));
        assert_eq!(config.particles.river.count, 5000);
    }

    #[test]
    fn test_rejects_unsampleable_particles() {
        let huge = r#"{ "particles": { "river": {
            "kind": { "type": "river", "amplitude": 0.6, "angular_speed": 0.3,
                      "wave_number": 0.2, "vertical_amplitude": 0.3 },
            "count": 10, "center": [0.0, 0.0, 0.0], "half_extents": [3e38, 1.0, 1.0],
            "color": [1.0, 1.0, 1.0, 1.0], "point_size": 2.0 } } }"#;
        let err = DreamConfig::from_json(huge).unwrap_err();
        assert!(format!("{:#}", err).contains("half_extents[0]"), "{:#}", err);

        let mut config = DreamConfig::default();
        config.particles.swarm.count = usize::MAX / 2;
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_rejects_bad_step() {
        assert!(DreamConfig::from_json(r#"{ "physics": { "fixed_step": 0.0 } }"#).is_err());
        assert!(DreamConfig::from_json("not json").is_err());
    }
}
