//! End-to-end frame loop scenarios, driven through the public API with the
//! headless backend.

use dreamscape::config::DreamConfig;
use dreamscape::focus::{FocusPoint, FocusTable, Topic};
use dreamscape::frame::{DriverState, FrameDriver};
use dreamscape::interaction::pick;
use dreamscape::particle::{FieldKind, ParticleField};
use dreamscape::physics::{BodyShape, PhysicsBridge, PhysicsConfig, Pose, SequenceDrift};
use dreamscape::raycast::Ray;
use dreamscape::render::HeadlessBackend;
use dreamscape::scene_graph::{GeometryKind, ObjectDesc, SceneRegistry, Transform};
use dreamscape::worlds::{World, WorldKind};
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

const DT: f32 = 1.0 / 60.0;

fn seeded_config() -> DreamConfig {
    let mut config = DreamConfig::default();
    config.particles.seed = Some(7);
    config.physics.drift_seed = Some(7);
    config
}

fn driver(kind: WorldKind) -> FrameDriver {
    let config = seeded_config();
    let world = World::build(kind, &config).unwrap();
    FrameDriver::new(world, config)
}

fn run(driver: &mut FrameDriver, backend: &mut HeadlessBackend, ticks: usize) {
    for _ in 0..ticks {
        driver.tick(DT, backend);
    }
}

#[test]
fn test_stateless_fields_are_bit_identical_for_equal_times() {
    let kinds = [
        FieldKind::River {
            amplitude: 0.8,
            angular_speed: 0.6,
            wave_number: 0.15,
            vertical_amplitude: 0.3,
        },
        FieldKind::Swarm {
            amplitude: 1.5,
            angular_speed: 0.9,
        },
    ];

    for kind in kinds {
        let mut rng = StdRng::seed_from_u64(99);
        let source = ParticleField::sample(kind, 500, Vec3::ZERO, Vec3::splat(25.0), &mut rng);

        let mut a = ParticleField::from_base(kind, source.base().to_vec()).unwrap();
        let mut b = ParticleField::from_base(kind, source.base().to_vec()).unwrap();

        // Different histories, same final time
        a.update(3.25, DT);
        for i in 0..40 {
            b.update(i as f32 * 0.37, DT);
        }
        b.update(3.25, DT);

        let bits = |f: &ParticleField| f.positions().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b), "{}", kind.name());
    }
}

#[test]
fn test_vent_height_stays_below_ceiling_across_wraps() {
    let ceiling = 12.0;
    let kind = FieldKind::VentStream {
        speed: 2.5,
        ceiling,
        sway: 0.2,
    };
    let start = ceiling - 1e-3;
    let mut field = ParticleField::from_base(kind, vec![0.0, start, 0.0, 1.0, 0.0, -1.0]).unwrap();

    for (time, dt) in [(0.1, 0.1), (10.0, 9.9), (500.0, 490.0), (500.0, 0.0)] {
        field.update(time, dt);
        for i in 0..field.len() {
            let y = field.point(i).unwrap().y;
            assert!((0.0..ceiling).contains(&y), "y = {} after dt {}", y, dt);
        }
    }
}

#[test]
fn test_click_without_focus_point_keeps_text() {
    let mut driver = driver(WorldKind::Reverie);
    let mut backend = HeadlessBackend::new();

    // Only the core keeps a focus entry
    driver.world_mut().focus = FocusTable::new().with(
        Topic::Graphics,
        FocusPoint::new([0.0, 0.5, 0.0], "Graphics", "Core only."),
    );

    assert!(driver.aim_at(Topic::Photography));
    driver.on_click();
    let report = driver.tick(DT, &mut backend);
    assert!(report.hovered.is_some());
    assert_eq!(report.focus_started, None);
    assert_eq!(driver.state(), DriverState::Idle);
    assert!(driver.focus_text().title.is_empty());
    assert_eq!(driver.focus_text().revision, 0);

    // Once something is focused, a dead click leaves that text in place
    driver.set_pointer_ndc(Vec2::ZERO);
    driver.on_click();
    run(&mut driver, &mut backend, 120);
    let before = driver.focus_text().clone();
    assert_eq!(before.title, "Graphics");

    assert!(driver.aim_at(Topic::Photography));
    driver.on_click();
    run(&mut driver, &mut backend, 5);
    assert_eq!(driver.focus_text(), &before);
}

#[test]
fn test_coincident_hits_pick_first_registered() {
    let mut scene = SceneRegistry::new();
    let at = Transform::from_position(Vec3::new(0.0, 0.0, -5.0));
    let first = scene.insert(
        ObjectDesc::new("first", GeometryKind::Sphere, "plain")
            .topic(Topic::Eating)
            .transform(at),
    );
    scene.insert(
        ObjectDesc::new("second", GeometryKind::Sphere, "plain")
            .topic(Topic::Programming)
            .transform(at),
    );

    let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
    let (hit, t) = pick(&scene, &ray).unwrap();
    assert_eq!(hit, first);
    assert!((t - 4.5).abs() < 1e-4);
}

#[test]
fn test_graphics_click_focuses_core() {
    let mut driver = driver(WorldKind::Reverie);
    let mut backend = HeadlessBackend::new();

    driver.resize(1280.0, 720.0);
    driver.set_pointer_ndc(Vec2::ZERO);
    driver.on_click();

    let first = driver.tick(DT, &mut backend);
    assert_eq!(first.focus_started, Some(Topic::Graphics));
    // Text switches when the transition starts, not when it ends
    assert_eq!(driver.focus_text().title, "Graphics");
    assert_eq!(driver.state(), DriverState::Transitioning);

    // 2s covers the 1.5s transition
    run(&mut driver, &mut backend, 120);

    let target = driver.camera().target;
    assert!((target - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-4, "{:?}", target);
    assert_eq!(driver.state(), DriverState::Idle);
    assert_eq!(driver.focus_text().title, "Graphics");
    assert_eq!(
        driver.focus_text().description,
        "Shaders, light and geometry: the part of the dream you can see breathing."
    );
    assert_eq!(driver.post_param("bloom", "strength"), Some(1.1));
}

#[test]
fn test_drift_moves_resting_body_without_runaway() {
    let config = PhysicsConfig {
        drift_seed: Some(2024),
        ..Default::default()
    };
    let mut bridge = PhysicsBridge::with_defaults(config);
    let body = bridge.create_body(BodyShape::Sphere { radius: 0.5 }, 1.0, Pose::at(Vec3::ZERO));
    let mut scene = SceneRegistry::new();

    for _ in 0..300 {
        bridge.step(DT, &mut scene);
    }

    let position = bridge.backend().pose(body).unwrap().position;
    assert!(position.is_finite());
    assert!(position.length() > 0.0);
    assert!(position.length() < 2.0, "drifted to {:?}", position);
}

#[test]
fn test_fixed_drift_sequence_is_reproducible() {
    let run_once = || {
        let mut bridge = PhysicsBridge::with_defaults(PhysicsConfig::default());
        bridge.set_drift_source(Box::new(SequenceDrift::new(vec![1.0, -0.5, 0.25])));
        let body = bridge.create_body(BodyShape::Sphere { radius: 0.5 }, 1.0, Pose::at(Vec3::ZERO));
        let mut scene = SceneRegistry::new();
        for _ in 0..300 {
            bridge.step(DT, &mut scene);
        }
        bridge.backend().pose(body).unwrap().position
    };
    assert_eq!(run_once(), run_once());
}

#[test]
fn test_hover_glow_follows_pointer() {
    let mut driver = driver(WorldKind::Reverie);
    let mut backend = HeadlessBackend::new();
    let lens = driver.world().scene.find("floating_lens").unwrap().id;
    let hover = DreamConfig::default().hover;

    driver.tick(DT, &mut backend);
    assert_eq!(driver.glow_of(lens), Some(hover.idle_glow));

    assert!(driver.aim_at(Topic::Photography));
    run(&mut driver, &mut backend, 70);
    assert_eq!(driver.interaction().state().hovered, Some(lens));
    assert_eq!(driver.glow_of(lens), Some(hover.hovered_glow));

    // Top-right corner looks into empty sky
    driver.set_pointer_ndc(Vec2::new(0.95, 0.95));
    run(&mut driver, &mut backend, 70);
    assert_eq!(driver.interaction().state().hovered, None);
    assert_eq!(driver.glow_of(lens), Some(hover.idle_glow));

    // Hover never starts a transition
    assert_eq!(driver.state(), DriverState::Idle);
}
