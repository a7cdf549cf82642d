//! Material definitions for dreamscape objects.
//!
//! Each material selects one of a fixed set of shader programs at build time.
//! Programs that animate take an explicit time uniform; the host never patches
//! shader source, it only feeds uniforms.

use std::collections::HashMap;
use std::sync::Arc;

/// Unique identifier for a material.
pub type MaterialId = String;

/// Shader program a material renders with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    /// Lit colour, no animation.
    #[default]
    Plain,
    /// Noise-driven vertex displacement ("breathing") fed by the time uniform.
    TimeDisplaced,
    /// Fresnel rim glow blended with a time-driven pulse.
    FresnelPulsed,
}

impl ShaderProgram {
    /// Whether the program reads per-frame uniforms.
    pub fn is_animated(&self) -> bool {
        !matches!(self, ShaderProgram::Plain)
    }
}

/// Blend modes for materials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// No blending, fully opaque.
    #[default]
    Opaque,
    /// Standard alpha blending.
    AlphaBlend,
    /// Additive blending (for glows, particles).
    Additive,
}

impl BlendMode {
    /// Convert to wgpu blend state.
    pub fn to_blend_state(&self) -> wgpu::BlendState {
        match self {
            BlendMode::Opaque => wgpu::BlendState::REPLACE,
            BlendMode::AlphaBlend => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
        }
    }
}

/// A host-defined material.
#[derive(Clone, Debug)]
pub struct Material {
    /// Unique identifier.
    pub id: MaterialId,
    /// Human-readable name.
    pub name: String,
    pub program: ShaderProgram,
    /// Base RGBA colour.
    pub base_color: [f32; 4],
    /// Rim/glow RGBA colour.
    pub glow_color: [f32; 4],
    /// Vertex displacement amplitude in object units (TimeDisplaced only).
    pub displacement: f32,
    /// Glow intensity before any hover easing.
    pub glow_intensity: f32,
    pub blend_mode: BlendMode,
}

impl Material {
    /// Create a new material builder.
    pub fn builder(id: impl Into<String>) -> MaterialBuilder {
        MaterialBuilder::new(id)
    }
}

/// Builder for creating materials.
pub struct MaterialBuilder {
    id: String,
    name: String,
    program: ShaderProgram,
    base_color: [f32; 4],
    glow_color: [f32; 4],
    displacement: f32,
    glow_intensity: f32,
    blend_mode: BlendMode,
}

impl MaterialBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            program: ShaderProgram::Plain,
            base_color: [1.0, 1.0, 1.0, 1.0],
            glow_color: [1.0, 1.0, 1.0, 1.0],
            displacement: 0.0,
            glow_intensity: 0.0,
            blend_mode: BlendMode::Opaque,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn program(mut self, program: ShaderProgram) -> Self {
        self.program = program;
        self
    }

    pub fn base_color(mut self, color: [f32; 4]) -> Self {
        self.base_color = color;
        self
    }

    pub fn glow_color(mut self, color: [f32; 4]) -> Self {
        self.glow_color = color;
        self
    }

    pub fn displacement(mut self, amount: f32) -> Self {
        self.displacement = amount;
        self
    }

    pub fn glow_intensity(mut self, intensity: f32) -> Self {
        self.glow_intensity = intensity;
        self
    }

    pub fn blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn build(self) -> Material {
        Material {
            id: self.id,
            name: self.name,
            program: self.program,
            base_color: self.base_color,
            glow_color: self.glow_color,
            displacement: self.displacement,
            glow_intensity: self.glow_intensity,
            blend_mode: self.blend_mode,
        }
    }
}

/// The material registry - holds all host-defined materials.
pub struct MaterialRegistry {
    materials: HashMap<MaterialId, Arc<Material>>,
    /// Registration order, so per-frame passes are deterministic.
    order: Vec<MaterialId>,
}

impl MaterialRegistry {
    /// Create a new registry with built-in materials.
    pub fn new() -> Self {
        let mut registry = Self {
            materials: HashMap::new(),
            order: Vec::new(),
        };
        registry.register_builtin_materials();
        registry
    }

    fn register_builtin_materials(&mut self) {
        self.register(
            Material::builder("plain")
                .name("Plain")
                .base_color([0.75, 0.75, 0.82, 1.0])
                .build(),
        );

        // Breathing core
        self.register(
            Material::builder("dream_core")
                .name("Dream Core")
                .program(ShaderProgram::TimeDisplaced)
                .base_color([0.45, 0.35, 0.95, 1.0])
                .glow_color([0.9, 0.6, 1.0, 1.0])
                .displacement(0.25)
                .glow_intensity(0.4)
                .build(),
        );

        // Hover-reactive lens for photography
        self.register(
            Material::builder("lens_glow")
                .name("Lens Glow")
                .program(ShaderProgram::FresnelPulsed)
                .base_color([0.1, 0.25, 0.35, 0.85])
                .glow_color([0.4, 0.95, 1.0, 1.0])
                .glow_intensity(0.2)
                .blend_mode(BlendMode::AlphaBlend)
                .build(),
        );

        self.register(
            Material::builder("circuit_glow")
                .name("Circuit Glow")
                .program(ShaderProgram::FresnelPulsed)
                .base_color([0.05, 0.2, 0.1, 0.9])
                .glow_color([0.3, 1.0, 0.5, 1.0])
                .glow_intensity(0.5)
                .blend_mode(BlendMode::AlphaBlend)
                .build(),
        );

        self.register(
            Material::builder("dream_fruit")
                .name("Dream Fruit")
                .program(ShaderProgram::TimeDisplaced)
                .base_color([1.0, 0.45, 0.3, 1.0])
                .glow_color([1.0, 0.8, 0.4, 1.0])
                .displacement(0.08)
                .glow_intensity(0.2)
                .build(),
        );

        self.register(
            Material::builder("halo")
                .name("Halo")
                .program(ShaderProgram::FresnelPulsed)
                .base_color([0.6, 0.5, 1.0, 0.25])
                .glow_color([0.8, 0.7, 1.0, 1.0])
                .glow_intensity(0.3)
                .blend_mode(BlendMode::Additive)
                .build(),
        );
    }

    /// Get a material by ID.
    pub fn get(&self, id: &str) -> Option<Arc<Material>> {
        self.materials.get(id).cloned()
    }

    /// Register a material. Re-registering an id replaces it in place.
    pub fn register(&mut self, material: Material) {
        if !self.materials.contains_key(&material.id) {
            self.order.push(material.id.clone());
        }
        self.materials.insert(material.id.clone(), Arc::new(material));
    }

    /// All materials in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Material>> {
        self.order.iter().filter_map(|id| self.materials.get(id))
    }

    /// Materials whose program reads per-frame uniforms.
    pub fn animated(&self) -> impl Iterator<Item = &Arc<Material>> {
        self.iter().filter(|m| m.program.is_animated())
    }

    /// Check if a material exists.
    pub fn exists(&self, id: &str) -> bool {
        self.materials.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_builtin_materials() {
        let registry = MaterialRegistry::new();
        for id in ["plain", "dream_core", "lens_glow", "circuit_glow", "dream_fruit", "halo"] {
            assert!(registry.exists(id), "missing {}", id);
        }
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_programs_selected_at_build_time() {
        let registry = MaterialRegistry::new();
        assert_eq!(registry.get("plain").unwrap().program, ShaderProgram::Plain);
        assert_eq!(registry.get("dream_core").unwrap().program, ShaderProgram::TimeDisplaced);
        assert_eq!(registry.get("lens_glow").unwrap().program, ShaderProgram::FresnelPulsed);
        assert!(registry.animated().all(|m| m.program != ShaderProgram::Plain));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = MaterialRegistry::new();
        let before: Vec<_> = registry.iter().map(|m| m.id.clone()).collect();
        registry.register(Material::builder("plain").base_color([0.0, 0.0, 0.0, 1.0]).build());
        let after: Vec<_> = registry.iter().map(|m| m.id.clone()).collect();

        assert_eq!(before, after);
        assert_eq!(registry.get("plain").unwrap().base_color, [0.0, 0.0, 0.0, 1.0]);
    }
}
