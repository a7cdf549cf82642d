//! Pointer picking, hover glow and click resolution.
//!
//! Input callbacks only write state. All ray casting happens in
//! [`InteractionResolver::poll`], once per frame, against the camera the frame
//! driver is about to present.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::easing::{EasingFunction, Tween};
use crate::focus::{FocusPoint, FocusTable, Topic};
use crate::raycast::Ray;
use crate::scene_graph::{ObjectId, SceneRegistry};

/// Drawable surface size in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// Pixel coordinates (origin top-left) to normalized device coordinates
    /// (origin centre, y up).
    pub fn to_ndc(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(x / self.width * 2.0 - 1.0, -(y / self.height * 2.0 - 1.0))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Hover glow settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HoverConfig {
    /// Topic whose objects react to hover.
    pub topic: Topic,
    pub idle_glow: f32,
    pub hovered_glow: f32,
    /// Time to ease between the two levels.
    pub ease_secs: f32,
    pub easing: EasingFunction,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            topic: Topic::Photography,
            idle_glow: 0.2,
            hovered_glow: 1.0,
            ease_secs: 0.35,
            easing: EasingFunction::QuadraticOut,
        }
    }
}

/// Transient per-frame interaction state.
#[derive(Clone, Debug, Default)]
pub struct InteractionState {
    pub viewport: Viewport,
    /// Latest pointer position; `None` until the pointer first moves.
    pub ndc: Option<Vec2>,
    /// Ray cast on the last poll.
    pub ray: Option<Ray>,
    pub hovered: Option<ObjectId>,
    /// Topic of the last accepted click.
    pub focused: Option<Topic>,
    pub transitioning: bool,
    pending_click: bool,
}

/// A click that resolved to a known focus point.
#[derive(Clone, Debug, PartialEq)]
pub struct FocusRequest {
    pub topic: Topic,
    pub object: ObjectId,
    pub point: FocusPoint,
}

/// Result of one poll.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PollOutcome {
    pub hovered: Option<ObjectId>,
    pub hover_changed: bool,
    pub focus: Option<FocusRequest>,
}

/// Eased glow levels for hover-reactive objects.
#[derive(Clone, Debug)]
pub struct HoverGlow {
    config: HoverConfig,
    tweens: HashMap<ObjectId, Tween<f32>>,
}

impl HoverGlow {
    /// Track every interactive object tagged with the configured topic.
    pub fn new(scene: &SceneRegistry, config: HoverConfig) -> Self {
        let tweens = scene
            .interactive()
            .filter(|o| o.topic == Some(config.topic))
            .map(|o| (o.id, Tween::at_rest(config.idle_glow, config.easing)))
            .collect();
        Self { config, tweens }
    }

    /// Ease each tracked object toward its hovered or idle level.
    pub fn update(&mut self, now: f32, hovered: Option<ObjectId>) {
        for (id, tween) in self.tweens.iter_mut() {
            let target = if hovered == Some(*id) {
                self.config.hovered_glow
            } else {
                self.config.idle_glow
            };
            if tween.target() != target {
                tween.retarget(now, target, self.config.ease_secs);
            }
        }
    }

    /// Current glow for a tracked object.
    pub fn glow(&self, id: ObjectId, now: f32) -> Option<f32> {
        self.tweens.get(&id).map(|t| t.sample(now))
    }
}

/// Nearest interactive object along `ray`.
///
/// Equal distances keep the earlier-registered object.
pub fn pick(scene: &SceneRegistry, ray: &Ray) -> Option<(ObjectId, f32)> {
    let mut best: Option<(ObjectId, f32)> = None;
    for object in scene.interactive().filter(|o| o.visible) {
        let t = &object.transform;
        let Some(distance) = object.collider.intersect(ray, t.position, t.orientation, t.scale) else {
            continue;
        };
        match best {
            Some((_, nearest)) if distance >= nearest => {}
            _ => best = Some((object.id, distance)),
        }
    }
    best
}

pub struct InteractionResolver {
    state: InteractionState,
    hover: HoverGlow,
}

impl InteractionResolver {
    pub fn new(scene: &SceneRegistry, config: HoverConfig) -> Self {
        Self {
            state: InteractionState::default(),
            hover: HoverGlow::new(scene, config),
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.state.viewport = Viewport::new(width, height);
    }

    /// Record a pointer position in pixels.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            // Pointer can be captured outside the surface
            let ndc = self.state.viewport.to_ndc(x, y);
            self.set_pointer_ndc(ndc);
        }
    }

    /// Record a pointer position already in normalized device coordinates.
    pub fn set_pointer_ndc(&mut self, ndc: Vec2) {
        if ndc.is_finite() {
            self.state.ndc = Some(ndc.clamp(Vec2::splat(-1.0), Vec2::splat(1.0)));
        }
    }

    /// Record a click. Resolved on the next poll.
    pub fn on_click(&mut self) {
        self.state.pending_click = true;
    }

    /// Cast the pointer ray, update hover glow and resolve any pending click.
    pub fn poll(&mut self, now: f32, camera: &Camera, scene: &SceneRegistry, focus: &FocusTable) -> PollOutcome {
        let hit = self.state.ndc.and_then(|ndc| {
            let ray = camera.ray_from_ndc(ndc, self.state.viewport.aspect());
            self.state.ray = Some(ray);
            pick(scene, &ray)
        });

        let hovered = hit.map(|(id, _)| id);
        let hover_changed = hovered != self.state.hovered;
        self.state.hovered = hovered;
        self.hover.update(now, hovered);

        let mut outcome = PollOutcome {
            hovered,
            hover_changed,
            focus: None,
        };

        if std::mem::take(&mut self.state.pending_click) {
            outcome.focus = self.resolve_click(hovered, scene, focus);
            if let Some(request) = &outcome.focus {
                self.state.focused = Some(request.topic);
            }
        }

        outcome
    }

    fn resolve_click(&self, hit: Option<ObjectId>, scene: &SceneRegistry, focus: &FocusTable) -> Option<FocusRequest> {
        let object = scene.get(hit?)?;
        let topic = object.topic?;
        match focus.get(topic) {
            Some(point) => Some(FocusRequest {
                topic,
                object: object.id,
                point: point.clone(),
            }),
            None => {
                log::debug!("Click on '{}' ({}) has no focus point; ignoring", object.name, topic);
                None
            }
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn set_transitioning(&mut self, transitioning: bool) {
        self.state.transitioning = transitioning;
    }

    pub fn hover_glow(&self, id: ObjectId, now: f32) -> Option<f32> {
        self.hover.glow(id, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raycast::Collider;
    use crate::scene_graph::{GeometryKind, ObjectDesc, Transform};
    use glam::Vec3;

    fn sphere_at(name: &str, position: Vec3, topic: Topic) -> ObjectDesc {
        ObjectDesc::new(name, GeometryKind::Sphere, "plain")
            .topic(topic)
            .transform(Transform::from_position(position))
            .collider(Collider::Sphere { radius: 1.0 })
    }

    #[test]
    fn test_to_ndc_flips_y() {
        let viewport = Viewport::new(200.0, 100.0);
        assert_eq!(viewport.to_ndc(100.0, 50.0), Vec2::ZERO);
        assert_eq!(viewport.to_ndc(0.0, 0.0), Vec2::new(-1.0, 1.0));
        assert_eq!(viewport.to_ndc(200.0, 100.0), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_pointer_outside_surface_is_clamped() {
        let scene = SceneRegistry::new();
        let mut resolver = InteractionResolver::new(&scene, HoverConfig::default());
        resolver.resize(100.0, 100.0);

        resolver.on_pointer_move(250.0, -80.0);
        assert_eq!(resolver.state().ndc, Some(Vec2::new(1.0, 1.0)));

        resolver.on_pointer_move(-30.0, 75.0);
        assert_eq!(resolver.state().ndc, Some(Vec2::new(-1.0, -0.5)));

        resolver.on_pointer_move(f32::NAN, 10.0);
        assert_eq!(resolver.state().ndc, Some(Vec2::new(-1.0, -0.5)));
    }

    #[test]
    fn test_pick_nearest() {
        let mut scene = SceneRegistry::new();
        let far = scene.insert(sphere_at("far", Vec3::new(0.0, 0.0, -10.0), Topic::Eating));
        let near = scene.insert(sphere_at("near", Vec3::new(0.0, 0.0, -5.0), Topic::Graphics));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);

        let (id, t) = pick(&scene, &ray).unwrap();
        assert_eq!(id, near);
        assert!((t - 4.0).abs() < 1e-4);
        assert_ne!(id, far);
    }

    #[test]
    fn test_pick_tie_goes_to_first_registered() {
        let mut scene = SceneRegistry::new();
        let first = scene.insert(sphere_at("first", Vec3::new(0.0, 0.0, -5.0), Topic::Eating));
        scene.insert(sphere_at("second", Vec3::new(0.0, 0.0, -5.0), Topic::Graphics));

        let (id, _) = pick(&scene, &Ray::new(Vec3::ZERO, Vec3::NEG_Z)).unwrap();
        assert_eq!(id, first);
    }

    #[test]
    fn test_pick_ignores_decorative() {
        let mut scene = SceneRegistry::new();
        scene.insert(
            ObjectDesc::new("rock", GeometryKind::Sphere, "plain")
                .transform(Transform::from_position(Vec3::new(0.0, 0.0, -3.0))),
        );
        let lens = scene.insert(sphere_at("lens", Vec3::new(0.0, 0.0, -8.0), Topic::Photography));

        let (id, _) = pick(&scene, &Ray::new(Vec3::ZERO, Vec3::NEG_Z)).unwrap();
        assert_eq!(id, lens);
    }

    #[test]
    fn test_click_without_focus_point_is_noop() {
        let mut scene = SceneRegistry::new();
        scene.insert(sphere_at("fruit", Vec3::ZERO, Topic::Eating));
        let focus = FocusTable::new();
        let camera = Camera {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            ..Default::default()
        };

        let mut resolver = InteractionResolver::new(&scene, HoverConfig::default());
        resolver.set_pointer_ndc(Vec2::ZERO);
        resolver.on_click();
        let outcome = resolver.poll(0.0, &camera, &scene, &focus);

        assert!(outcome.hovered.is_some());
        assert!(outcome.focus.is_none());
        assert!(resolver.state().focused.is_none());
    }

    #[test]
    fn test_click_is_consumed_once() {
        let mut scene = SceneRegistry::new();
        scene.insert(sphere_at("core", Vec3::ZERO, Topic::Graphics));
        let focus = FocusTable::new().with(Topic::Graphics, FocusPoint::new([0.0; 3], "G", "g"));
        let camera = Camera {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            ..Default::default()
        };

        let mut resolver = InteractionResolver::new(&scene, HoverConfig::default());
        resolver.set_pointer_ndc(Vec2::ZERO);
        resolver.on_click();
        assert!(resolver.poll(0.0, &camera, &scene, &focus).focus.is_some());
        assert!(resolver.poll(0.1, &camera, &scene, &focus).focus.is_none());
        assert_eq!(resolver.state().focused, Some(Topic::Graphics));
    }

    #[test]
    fn test_hover_glow_eases_both_ways() {
        let mut scene = SceneRegistry::new();
        let lens = scene.insert(sphere_at("lens", Vec3::ZERO, Topic::Photography));
        let config = HoverConfig::default();
        let mut glow = HoverGlow::new(&scene, config.clone());

        assert_eq!(glow.glow(lens, 0.0), Some(config.idle_glow));
        glow.update(0.0, Some(lens));
        let mid = glow.glow(lens, 0.1).unwrap();
        assert!(mid > config.idle_glow && mid < config.hovered_glow);
        assert_eq!(glow.glow(lens, 1.0), Some(config.hovered_glow));

        glow.update(1.0, None);
        assert_eq!(glow.glow(lens, 2.0), Some(config.idle_glow));
    }
}
