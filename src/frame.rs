//! The per-frame driver.
//!
//! One [`FrameDriver::tick`] runs the whole frame in a fixed order:
//! physics step, shader uniform write, particle update, interaction poll,
//! camera/post commit, present. The elapsed time is sampled once at the top
//! of the tick and shared by every stage.

use glam::{Vec2, Vec3};
use serde::Serialize;

use crate::camera::Camera;
use crate::config::DreamConfig;
use crate::easing::{EasingFunction, Tween};
use crate::focus::Topic;
use crate::interaction::{FocusRequest, InteractionResolver};
use crate::post_processing::PostEffectRegistry;
use crate::render::{DrawItem, FrameSubmission, ParticleBatch, RenderBackend};
use crate::scene_graph::ObjectId;
use crate::shader_animator::ShaderAnimator;
use crate::worlds::World;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    #[default]
    Idle,
    /// The camera target is easing toward a focus point.
    Transitioning,
}

/// Title and description shown for the focused topic.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FocusText {
    pub title: String,
    pub description: String,
    /// Bumped on every change so hosts can skip redundant writes.
    pub revision: u64,
}

/// What happened during one tick.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameReport {
    pub time: f32,
    pub dt: f32,
    pub physics_steps: u32,
    pub shaders_written: usize,
    pub hovered: Option<u32>,
    pub hover_changed: bool,
    /// Topic whose transition started this frame.
    pub focus_started: Option<Topic>,
    pub state: DriverState,
    pub camera_target: [f32; 3],
    pub surface_opacity: f32,
}

pub struct FrameDriver {
    world: World,
    config: DreamConfig,
    camera: Camera,
    animator: ShaderAnimator,
    interaction: InteractionResolver,
    post_effects: PostEffectRegistry,
    target: Tween<Vec3>,
    bloom: Tween<f32>,
    base_bloom: f32,
    opacity: Tween<f32>,
    content_ready: bool,
    state: DriverState,
    text: FocusText,
}

impl FrameDriver {
    pub fn new(world: World, config: DreamConfig) -> Self {
        let camera = Camera::from_config(&config.camera);
        let post_effects = PostEffectRegistry::new();
        let base_bloom = world
            .post
            .get("bloom")
            .and_then(|e| e.get_param("strength"))
            .or_else(|| post_effects.get("bloom").and_then(|e| e.get_default("strength")))
            .unwrap_or(0.0);
        let easing = config.transition.easing;

        Self {
            interaction: InteractionResolver::new(&world.scene, config.hover.clone()),
            animator: ShaderAnimator::new(config.shader.clone()),
            target: Tween::at_rest(camera.target, easing),
            bloom: Tween::at_rest(base_bloom, easing),
            base_bloom,
            opacity: Tween::at_rest(0.0, EasingFunction::QuadraticOut),
            content_ready: false,
            state: DriverState::Idle,
            text: FocusText::default(),
            post_effects,
            camera,
            world,
            config,
        }
    }

    /// Run one frame.
    pub fn tick(&mut self, dt: f32, backend: &mut dyn RenderBackend) -> FrameReport {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let now = self.animator.advance(dt);

        let physics_steps = self.world.physics.step(dt, &mut self.world.scene);

        let shaders_written = self.animator.update(now, &self.world.materials, backend);
        if !self.content_ready && self.animator.all_captured(&self.world.materials) {
            self.signal_content_ready();
        }

        for field in &mut self.world.fields {
            field.update(now, dt);
        }

        let outcome = self
            .interaction
            .poll(now, &self.camera, &self.world.scene, &self.world.focus);
        let focus_started = outcome.focus.map(|request| self.begin_transition(now, request));

        self.commit(now);
        self.present(now, backend);

        FrameReport {
            time: now,
            dt,
            physics_steps,
            shaders_written,
            hovered: outcome.hovered.map(|id| id.0),
            hover_changed: outcome.hover_changed,
            focus_started,
            state: self.state,
            camera_target: self.camera.target.to_array(),
            surface_opacity: self.opacity.sample(now),
        }
    }

    fn begin_transition(&mut self, now: f32, request: FocusRequest) -> Topic {
        let duration = self.config.transition.duration_secs;
        self.target.retarget(now, request.point.position_vec3(), duration);
        self.bloom
            .retarget(now, request.point.bloom.unwrap_or(self.base_bloom), duration);

        self.text.title = request.point.title;
        self.text.description = request.point.description;
        self.text.revision += 1;

        if self.state == DriverState::Transitioning {
            log::debug!("Retargeting in-flight transition to '{}'", request.topic);
        } else {
            log::info!("Focusing '{}'", request.topic);
        }
        self.state = DriverState::Transitioning;
        request.topic
    }

    fn commit(&mut self, now: f32) {
        self.camera.target = self.target.sample(now);
        self.world.post.set_param("bloom", "strength", self.bloom.sample(now));
        self.world.post.set_param("fade", "opacity", self.opacity.sample(now));

        if self.state == DriverState::Transitioning && self.target.is_finished(now) && self.bloom.is_finished(now) {
            self.state = DriverState::Idle;
        }
        self.interaction
            .set_transitioning(self.state == DriverState::Transitioning);
    }

    fn present(&mut self, now: f32, backend: &mut dyn RenderBackend) {
        let mut draws = Vec::with_capacity(self.world.scene.len());
        for object in self.world.scene.iter().filter(|o| o.visible) {
            let Some(material) = self.world.materials.get(&object.material) else {
                continue;
            };
            let shader = self.animator.state(&material.id).copied().unwrap_or_default();
            let glow = self
                .interaction
                .hover_glow(object.id, now)
                .unwrap_or(material.glow_intensity);

            draws.push(DrawItem {
                object: object.id,
                geometry: object.geometry,
                material: material.id.clone(),
                program: material.program,
                blend_mode: material.blend_mode,
                model: object.transform.matrix(),
                shader,
                base_color: material.base_color,
                glow_color: material.glow_color,
                glow,
            });
        }

        let particles = self
            .world
            .fields
            .iter()
            .enumerate()
            .map(|(slot, field)| ParticleBatch {
                slot,
                positions: field.positions(),
                dirty: field.is_dirty(),
                version: field.version(),
                color: field.color,
                point_size: field.point_size,
            })
            .collect();

        let frame = FrameSubmission {
            time: now,
            camera: self.camera,
            draws,
            particles,
            post: self.world.post.resolve(&self.post_effects),
            surface_opacity: self.opacity.sample(now),
            clear_color: self.world.clear_color,
        };
        backend.present(&frame);

        for field in &mut self.world.fields {
            field.mark_clean();
        }
    }

    /// Start the one-time fade-in of the interactive surface.
    pub fn signal_content_ready(&mut self) {
        if self.content_ready {
            return;
        }
        self.content_ready = true;
        let now = self.animator.elapsed();
        self.opacity.retarget(now, 1.0, self.config.fade_in_secs);
        log::info!("Content ready at {:.2}s; fading in", now);
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        self.interaction.on_pointer_move(x, y);
    }

    pub fn set_pointer_ndc(&mut self, ndc: Vec2) {
        self.interaction.set_pointer_ndc(ndc);
    }

    pub fn on_click(&mut self) {
        self.interaction.on_click();
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.interaction.resize(width, height);
    }

    pub fn focus_text(&self) -> &FocusText {
        &self.text
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn elapsed(&self) -> f32 {
        self.animator.elapsed()
    }

    pub fn is_content_ready(&self) -> bool {
        self.content_ready
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn interaction(&self) -> &InteractionResolver {
        &self.interaction
    }

    pub fn shader_animator(&self) -> &ShaderAnimator {
        &self.animator
    }

    /// Current glow of an object, hover easing included.
    pub fn glow_of(&self, id: ObjectId) -> Option<f32> {
        let object = self.world.scene.get(id)?;
        let now = self.animator.elapsed();
        self.interaction.hover_glow(id, now).or_else(|| {
            self.world
                .materials
                .get(&object.material)
                .map(|m| m.glow_intensity)
        })
    }

    /// Pointer position in NDC that lands on the object's origin under the
    /// current camera. `None` if the object is unknown or behind the camera.
    pub fn ndc_of(&self, id: ObjectId) -> Option<Vec2> {
        let object = self.world.scene.get(id)?;
        let aspect = self.interaction.state().viewport.aspect();
        let clip = self.camera.view_projection_matrix(aspect) * object.transform.position.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some(Vec2::new(clip.x / clip.w, clip.y / clip.w))
    }

    /// Aim the pointer at the first interactive object tagged `topic`.
    pub fn aim_at(&mut self, topic: Topic) -> bool {
        let target = self
            .world
            .scene
            .interactive()
            .find(|o| o.topic == Some(topic))
            .map(|o| o.id);
        match target.and_then(|id| self.ndc_of(id)) {
            Some(ndc) => {
                self.set_pointer_ndc(ndc);
                true
            }
            None => false,
        }
    }

    /// Toggle a post effect in the world's chain. Returns false if the chain
    /// has no such effect.
    pub fn set_effect_enabled(&mut self, effect: &str, enabled: bool) -> bool {
        let found = self.world.post.set_enabled(effect, enabled);
        if !found {
            log::warn!("No post effect '{}' in the chain", effect);
        }
        found
    }

    /// Current post parameter value as it will be submitted.
    pub fn post_param(&self, effect: &str, name: &str) -> Option<f32> {
        let def = self.post_effects.get(effect)?;
        let instance = self.world.post.get(effect)?;
        let param = def.params.iter().find(|p| p.name == name)?;
        Some(param.clamp(instance.get_param(name).unwrap_or(param.default_value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;
    use crate::worlds::WorldKind;

    fn driver(kind: WorldKind) -> FrameDriver {
        let mut config = DreamConfig::default();
        config.particles.seed = Some(3);
        config.physics.drift_seed = Some(3);
        let world = World::build(kind, &config).unwrap();
        FrameDriver::new(world, config)
    }

    #[test]
    fn test_bad_dt_is_zero() {
        let mut driver = driver(WorldKind::Reverie);
        let mut backend = HeadlessBackend::new();
        driver.tick(0.5, &mut backend);
        assert_eq!(driver.tick(-1.0, &mut backend).time, 0.5);
        assert_eq!(driver.tick(f32::INFINITY, &mut backend).dt, 0.0);
    }

    #[test]
    fn test_content_ready_waits_for_programs() {
        let mut driver = driver(WorldKind::Abyss);
        let mut backend = HeadlessBackend::with_program_delay(3);

        for _ in 0..3 {
            let report = driver.tick(1.0 / 60.0, &mut backend);
            assert!(!driver.is_content_ready());
            assert_eq!(report.surface_opacity, 0.0);
        }
        driver.tick(1.0 / 60.0, &mut backend);
        assert!(driver.is_content_ready());

        for _ in 0..120 {
            driver.tick(1.0 / 60.0, &mut backend);
        }
        assert_eq!(backend.last_frame().unwrap().surface_opacity, 1.0);
        assert_eq!(driver.post_param("fade", "opacity"), Some(1.0));
    }

    #[test]
    fn test_fields_uploaded_every_frame() {
        let mut driver = driver(WorldKind::Abyss);
        let mut backend = HeadlessBackend::new();
        for _ in 0..4 {
            driver.tick(1.0 / 60.0, &mut backend);
        }
        assert_eq!(backend.uploads(), 8);
        assert_eq!(backend.last_frame().unwrap().particle_points, vec![3000, 2000]);
        assert!(driver.world().fields.iter().all(|f| !f.is_dirty()));
    }

    #[test]
    fn test_post_chain_order() {
        let mut driver = driver(WorldKind::Reverie);
        let mut backend = HeadlessBackend::new();
        driver.tick(1.0 / 60.0, &mut backend);
        assert_eq!(
            backend.last_frame().unwrap().post,
            vec!["bloom", "chromatic_aberration", "vignette", "fade"]
        );
    }

    #[test]
    fn test_last_click_wins() {
        let mut driver = driver(WorldKind::Reverie);
        let mut backend = HeadlessBackend::new();
        let core_target = Vec3::new(0.0, 0.5, 0.0);

        driver.set_pointer_ndc(Vec2::ZERO);
        driver.on_click();
        let report = driver.tick(1.0 / 60.0, &mut backend);
        assert_eq!(report.focus_started, Some(Topic::Graphics));
        assert_eq!(driver.state(), DriverState::Transitioning);
        let revision = driver.focus_text().revision;

        // Click again mid-flight on the same target; the transition restarts
        // from where it is and still ends on the focus point
        for _ in 0..30 {
            driver.tick(1.0 / 60.0, &mut backend);
        }
        driver.on_click();
        driver.tick(1.0 / 60.0, &mut backend);
        assert_eq!(driver.focus_text().revision, revision + 1);
        assert_eq!(driver.state(), DriverState::Transitioning);

        for _ in 0..120 {
            driver.tick(1.0 / 60.0, &mut backend);
        }
        assert_eq!(driver.state(), DriverState::Idle);
        assert!((driver.camera().target - core_target).length() < 1e-4);
    }
}
