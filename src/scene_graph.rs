//! Scene registry for dreamscape objects.
//!
//! Holds every visual object in insertion order together with the subset that
//! takes part in pointer picking. Objects are created while a world is built
//! and live for the whole session; the per-frame systems only mutate their
//! transforms.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::focus::{FocusTable, Topic};
use crate::material::MaterialId;
use crate::physics::BodyHandle;
use crate::raycast::Collider;

/// Unique identifier for scene objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// Built-in geometry shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Sphere,
    Cube,
    Torus,
    Plane,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 4] = [
        GeometryKind::Sphere,
        GeometryKind::Cube,
        GeometryKind::Torus,
        GeometryKind::Plane,
    ];
}

/// Transform component for scene objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    /// Model matrix: translation * rotation * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }
}

/// A renderable object in the registry.
#[derive(Debug, Clone)]
pub struct VisualObject {
    pub id: ObjectId,
    pub name: String,
    /// Topic tag; `None` for decorative geometry.
    pub topic: Option<Topic>,
    pub transform: Transform,
    pub geometry: GeometryKind,
    pub material: MaterialId,
    /// Local-space pick shape.
    pub collider: Collider,
    /// Rigid body driving this object's transform, if any.
    pub body: Option<BodyHandle>,
    pub visible: bool,
}

/// Description used to register a new object.
#[derive(Debug, Clone)]
pub struct ObjectDesc {
    pub name: String,
    pub topic: Option<Topic>,
    pub transform: Transform,
    pub geometry: GeometryKind,
    pub material: MaterialId,
    pub collider: Collider,
    pub interactive: bool,
}

impl ObjectDesc {
    pub fn new(name: impl Into<String>, geometry: GeometryKind, material: impl Into<String>) -> Self {
        let collider = match geometry {
            GeometryKind::Sphere => Collider::Sphere { radius: 0.5 },
            GeometryKind::Torus => Collider::Sphere { radius: 0.7 },
            GeometryKind::Cube => Collider::Box { half_extents: Vec3::splat(0.5) },
            GeometryKind::Plane => Collider::Box { half_extents: Vec3::new(0.5, 0.001, 0.5) },
        };
        Self {
            name: name.into(),
            topic: None,
            transform: Transform::default(),
            geometry,
            material: material.into(),
            collider,
            interactive: false,
        }
    }

    /// Tag with a topic and mark as pickable.
    pub fn topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self.interactive = true;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn collider(mut self, collider: Collider) -> Self {
        self.collider = collider;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}

/// The scene registry.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    objects: Vec<VisualObject>,
    by_name: HashMap<String, ObjectId>,
    /// Pickable objects in registration order.
    interactive: Vec<ObjectId>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object. Ids are dense and follow insertion order.
    pub fn insert(&mut self, desc: ObjectDesc) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        if desc.interactive {
            self.interactive.push(id);
        }
        self.by_name.insert(desc.name.clone(), id);
        self.objects.push(VisualObject {
            id,
            name: desc.name,
            topic: desc.topic,
            transform: desc.transform,
            geometry: desc.geometry,
            material: desc.material,
            collider: desc.collider,
            body: None,
            visible: true,
        });
        id
    }

    /// Attach a physics body to an object.
    pub fn link_body(&mut self, id: ObjectId, body: BodyHandle) -> bool {
        match self.get_mut(id) {
            Some(object) => {
                object.body = Some(body);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&VisualObject> {
        self.objects.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut VisualObject> {
        self.objects.get_mut(id.0 as usize)
    }

    pub fn find(&self, name: &str) -> Option<&VisualObject> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// All objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &VisualObject> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut VisualObject> {
        self.objects.iter_mut()
    }

    /// Pickable objects in registration order.
    pub fn interactive(&self) -> impl Iterator<Item = &VisualObject> {
        self.interactive.iter().filter_map(|id| self.get(*id))
    }

    pub fn is_interactive(&self, id: ObjectId) -> bool {
        self.interactive.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Topics used by objects that have no focus point. Logged, never fatal.
    pub fn validate_topics(&self, focus: &FocusTable) -> Vec<Topic> {
        let mut missing = Vec::new();
        for object in &self.objects {
            if let Some(topic) = object.topic {
                if !focus.contains(topic) && !missing.contains(&topic) {
                    log::warn!(
                        "Object '{}' is tagged '{}' but no focus point exists; clicks on it will be ignored",
                        object.name,
                        topic
                    );
                    missing.push(topic);
                }
            }
        }
        missing
    }
}
