//! The two dreamscapes.
//!
//! Both worlds register one interactive object per topic, some decorative
//! geometry that is never picked, a focus table and their particle fields.
//! The graphics core always sits at the origin so the default camera looks
//! straight at it.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::DreamConfig;
use crate::focus::{FocusPoint, FocusTable, Topic};
use crate::material::MaterialRegistry;
use crate::particle::ParticleField;
use crate::physics::{BodyHandle, BodyShape, PhysicsBridge, Pose};
use crate::post_processing::PostProcessingChain;
use crate::raycast::Collider;
use crate::scene_graph::{GeometryKind, ObjectDesc, SceneRegistry, Transform};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldKind {
    /// Violet core over a slow particle river.
    #[default]
    Reverie,
    /// Deep-sea scene with a hydrothermal vent stream and a swarm.
    Abyss,
}

impl WorldKind {
    pub const ALL: [WorldKind; 2] = [WorldKind::Reverie, WorldKind::Abyss];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorldKind::Reverie => "reverie",
            WorldKind::Abyss => "abyss",
        }
    }
}

impl fmt::Display for WorldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorldKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reverie" => Ok(WorldKind::Reverie),
            "abyss" => Ok(WorldKind::Abyss),
            other => bail!("Unknown world '{}' (expected 'reverie' or 'abyss')", other),
        }
    }
}

/// Everything a frame driver needs to run one scene.
pub struct World {
    pub kind: WorldKind,
    pub scene: SceneRegistry,
    pub focus: FocusTable,
    pub materials: MaterialRegistry,
    pub physics: PhysicsBridge,
    pub fields: Vec<ParticleField>,
    pub post: PostProcessingChain,
    pub clear_color: [f32; 4],
}

impl World {
    pub fn build(kind: WorldKind, config: &DreamConfig) -> Result<Self> {
        let mut world = Self {
            kind,
            scene: SceneRegistry::new(),
            focus: FocusTable::new(),
            materials: MaterialRegistry::new(),
            physics: PhysicsBridge::with_defaults(config.physics.clone()),
            fields: Vec::new(),
            post: PostProcessingChain::dream_default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        };

        match kind {
            WorldKind::Reverie => world.build_reverie(config)?,
            WorldKind::Abyss => world.build_abyss(config)?,
        }

        for object in world.scene.iter() {
            if !world.materials.exists(&object.material) {
                bail!("Object '{}' uses unknown material '{}'", object.name, object.material);
            }
        }
        world.scene.validate_topics(&world.focus);

        log::info!(
            "Built world '{}': {} objects ({} interactive), {} particle fields, {} points",
            kind,
            world.scene.len(),
            world.scene.interactive().count(),
            world.fields.len(),
            world.fields.iter().map(|f| f.len()).sum::<usize>()
        );
        Ok(world)
    }

    fn build_reverie(&mut self, config: &DreamConfig) -> Result<()> {
        self.clear_color = [0.02, 0.01, 0.06, 1.0];

        self.scene.insert(
            ObjectDesc::new("dream_core", GeometryKind::Sphere, "dream_core")
                .topic(Topic::Graphics)
                .transform(Transform::from_position(Vec3::ZERO).with_scale(Vec3::splat(4.0))),
        );
        self.scene.insert(
            ObjectDesc::new("core_halo", GeometryKind::Torus, "halo").transform(
                Transform::from_position(Vec3::ZERO)
                    .with_scale(Vec3::splat(5.0))
                    .with_orientation(Quat::from_rotation_x(1.2)),
            ),
        );
        self.scene.insert(
            ObjectDesc::new("mirror_floor", GeometryKind::Plane, "plain")
                .transform(Transform::from_position(Vec3::new(0.0, -4.0, 0.0)).with_scale(Vec3::splat(60.0))),
        );

        let lens = self.add_floating(
            ObjectDesc::new("floating_lens", GeometryKind::Sphere, "lens_glow")
                .topic(Topic::Photography)
                .transform(Transform::from_position(Vec3::new(-5.0, 1.5, 2.0)).with_scale(Vec3::splat(1.6))),
            1.0,
        );
        self.physics.set_spin(lens, Vec3::new(0.0, 0.4, 0.0));

        let monolith = self.add_floating(
            ObjectDesc::new("code_monolith", GeometryKind::Cube, "circuit_glow")
                .topic(Topic::Programming)
                .transform(Transform::from_position(Vec3::new(5.0, 0.5, 1.0)).with_scale(Vec3::new(1.2, 2.5, 1.2))),
            2.0,
        );
        self.physics.set_spin(monolith, Vec3::new(0.0, -0.2, 0.0));

        self.add_floating(
            ObjectDesc::new("dream_fruit", GeometryKind::Sphere, "dream_fruit")
                .topic(Topic::Eating)
                .transform(Transform::from_position(Vec3::new(2.5, -1.5, 4.0)).with_scale(Vec3::splat(1.2))),
            0.5,
        );

        self.focus = FocusTable::new()
            .with(
                Topic::Graphics,
                FocusPoint::new(
                    [0.0, 0.5, 0.0],
                    "Graphics",
                    "Shaders, light and geometry: the part of the dream you can see breathing.",
                )
                .with_bloom(1.1),
            )
            .with(
                Topic::Photography,
                FocusPoint::new(
                    [-5.0, 1.5, 2.0],
                    "Photography",
                    "A floating lens that remembers every frame it has caught.",
                )
                .with_bloom(0.8),
            )
            .with(
                Topic::Programming,
                FocusPoint::new(
                    [5.0, 0.5, 1.0],
                    "Programming",
                    "A monolith of circuits humming with code that writes the dream.",
                ),
            )
            .with(
                Topic::Eating,
                FocusPoint::new(
                    [2.5, -1.5, 4.0],
                    "Eating",
                    "Fruit that tastes of whatever you last dreamt about.",
                )
                .with_bloom(0.9),
            );

        let mut rng = config.particles.rng();
        self.fields.push(ParticleField::from_spec(&config.particles.river, &mut rng)?);
        Ok(())
    }

    fn build_abyss(&mut self, config: &DreamConfig) -> Result<()> {
        self.clear_color = [0.0, 0.02, 0.05, 1.0];

        self.scene.insert(
            ObjectDesc::new("abyss_core", GeometryKind::Sphere, "dream_core")
                .topic(Topic::Graphics)
                .transform(Transform::from_position(Vec3::ZERO).with_scale(Vec3::splat(3.6))),
        );
        self.scene.insert(
            ObjectDesc::new("seabed", GeometryKind::Plane, "plain")
                .transform(Transform::from_position(Vec3::new(0.0, -3.0, 0.0)).with_scale(Vec3::splat(80.0))),
        );
        self.scene.insert(
            ObjectDesc::new("vent_chimney", GeometryKind::Cube, "plain")
                .transform(Transform::from_position(Vec3::new(0.0, -1.5, -4.0)).with_scale(Vec3::new(1.5, 3.0, 1.5))),
        );

        let lens = self.add_floating(
            ObjectDesc::new("angler_lens", GeometryKind::Sphere, "lens_glow")
                .topic(Topic::Photography)
                .transform(Transform::from_position(Vec3::new(4.0, 2.0, -1.0)).with_scale(Vec3::splat(1.4))),
            1.0,
        );
        self.physics.set_spin(lens, Vec3::new(0.1, 0.3, 0.0));

        self.add_floating(
            ObjectDesc::new("kelp_terminal", GeometryKind::Cube, "circuit_glow")
                .topic(Topic::Programming)
                .transform(Transform::from_position(Vec3::new(-4.5, 0.0, 0.5)).with_scale(Vec3::new(1.0, 2.2, 1.0))),
            2.0,
        );
        self.add_floating(
            ObjectDesc::new("glow_fruit", GeometryKind::Sphere, "dream_fruit")
                .topic(Topic::Eating)
                .transform(Transform::from_position(Vec3::new(-2.0, 2.5, 3.0))),
            0.5,
        );

        self.focus = FocusTable::new()
            .with(
                Topic::Graphics,
                FocusPoint::new(
                    [0.0, 0.5, 0.0],
                    "Graphics",
                    "A core that pulses in the dark, lit only by its own shader.",
                )
                .with_bloom(1.3),
            )
            .with(
                Topic::Photography,
                FocusPoint::new(
                    [4.0, 2.0, -1.0],
                    "Photography",
                    "The angler's lure is a lens; what it draws in, it keeps.",
                )
                .with_bloom(0.9),
            )
            .with(
                Topic::Programming,
                FocusPoint::new(
                    [-4.5, 0.0, 0.5],
                    "Programming",
                    "Kelp grown around a terminal, swaying to the rhythm of a build.",
                ),
            )
            .with(
                Topic::Eating,
                FocusPoint::new(
                    [-2.0, 2.5, 3.0],
                    "Eating",
                    "Bioluminescent fruit drifting up from the vents.",
                ),
            );

        let mut rng = config.particles.rng();
        self.fields.push(ParticleField::from_spec(&config.particles.vent, &mut rng)?);
        self.fields.push(ParticleField::from_spec(&config.particles.swarm, &mut rng)?);
        Ok(())
    }

    /// Register an object driven by a rigid body of `mass`.
    fn add_floating(&mut self, desc: ObjectDesc, mass: f32) -> BodyHandle {
        let shape = match desc.collider {
            Collider::Sphere { radius } => BodyShape::Sphere {
                radius: radius * desc.transform.scale.max_element(),
            },
            Collider::Box { half_extents } => BodyShape::Box {
                half_extents: half_extents * desc.transform.scale,
            },
        };
        let pose = Pose::new(desc.transform.position, desc.transform.orientation);
        let id = self.scene.insert(desc);
        let body = self.physics.create_body(shape, mass, pose);
        self.scene.link_body(id, body);
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config() -> DreamConfig {
        let mut config = DreamConfig::default();
        config.particles.seed = Some(11);
        config.physics.drift_seed = Some(11);
        config
    }

    #[test]
    fn test_every_topic_has_focus_point() {
        for kind in WorldKind::ALL {
            let world = World::build(kind, &seeded_config()).unwrap();
            assert!(world.scene.validate_topics(&world.focus).is_empty());
            for topic in Topic::ALL {
                assert!(world.scene.interactive().any(|o| o.topic == Some(topic)), "{} lacks {}", kind, topic);
            }
        }
    }

    #[test]
    fn test_build_rejects_oversized_sampling_box() {
        let mut config = seeded_config();
        config.particles.river.half_extents = [3e38, 1.0, 1.0];
        assert!(World::build(WorldKind::Reverie, &config).is_err());

        let mut config = seeded_config();
        config.particles.vent.half_extents[1] = f32::INFINITY;
        assert!(World::build(WorldKind::Abyss, &config).is_err());
    }

    #[test]
    fn test_particle_counts() {
        let reverie = World::build(WorldKind::Reverie, &seeded_config()).unwrap();
        let counts: Vec<_> = reverie.fields.iter().map(|f| f.len()).collect();
        assert_eq!(counts, vec![5000]);

        let abyss = World::build(WorldKind::Abyss, &seeded_config()).unwrap();
        let counts: Vec<_> = abyss.fields.iter().map(|f| f.len()).collect();
        assert_eq!(counts, vec![3000, 2000]);
    }

    #[test]
    fn test_decorative_geometry_not_interactive() {
        let world = World::build(WorldKind::Abyss, &seeded_config()).unwrap();
        let seabed = world.scene.find("seabed").unwrap();
        assert!(!world.scene.is_interactive(seabed.id));
        assert!(seabed.topic.is_none());
    }

    #[test]
    fn test_floating_objects_have_bodies() {
        let world = World::build(WorldKind::Reverie, &seeded_config()).unwrap();
        assert!(world.scene.find("floating_lens").unwrap().body.is_some());
        assert!(world.scene.find("dream_core").unwrap().body.is_none());
        assert_eq!(world.physics.backend().bodies().len(), 3);
    }

    #[test]
    fn test_parse_world_kind() {
        assert_eq!("Abyss".parse::<WorldKind>().unwrap(), WorldKind::Abyss);
        assert!("nowhere".parse::<WorldKind>().is_err());
    }
}
