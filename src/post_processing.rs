//! Post-processing effect chain.
//!
//! Effects are defined once in a registry and instanced into an ordered chain.
//! Every frame the chain resolves into [`PostStage`]s that the render backend
//! applies in order after the scene pass.

use std::collections::HashMap;

/// Unique identifier for a post-processing effect.
pub type EffectId = String;

/// Maximum float parameters one stage can carry to the GPU.
pub const MAX_STAGE_PARAMS: usize = 3;

/// Definition of an effect parameter.
#[derive(Clone, Debug)]
pub struct EffectParamDef {
    pub name: String,
    pub default_value: f32,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl EffectParamDef {
    pub fn float(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default_value: default,
            min: None,
            max: None,
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Clamp a value into this parameter's range.
    pub fn clamp(&self, value: f32) -> f32 {
        let value = if value.is_finite() { value } else { self.default_value };
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }
}

/// Definition of a post-processing effect.
#[derive(Clone, Debug)]
pub struct PostEffect {
    pub id: EffectId,
    pub params: Vec<EffectParamDef>,
    /// Stage selector understood by the post shader.
    pub stage_code: u32,
}

impl PostEffect {
    /// Create a new effect builder.
    pub fn builder(id: impl Into<String>) -> PostEffectBuilder {
        PostEffectBuilder::new(id)
    }

    /// Get the default value for a parameter.
    pub fn get_default(&self, name: &str) -> Option<f32> {
        self.params.iter().find(|p| p.name == name).map(|p| p.default_value)
    }
}

/// Builder for post-processing effects.
pub struct PostEffectBuilder {
    id: String,
    params: Vec<EffectParamDef>,
    stage_code: u32,
}

impl PostEffectBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: Vec::new(),
            stage_code: 0,
        }
    }

    pub fn param(mut self, param: EffectParamDef) -> Self {
        self.params.push(param);
        self
    }

    pub fn stage_code(mut self, code: u32) -> Self {
        self.stage_code = code;
        self
    }

    pub fn build(self) -> PostEffect {
        PostEffect {
            id: self.id,
            params: self.params,
            stage_code: self.stage_code,
        }
    }
}

/// Runtime instance of a post-processing effect.
#[derive(Clone, Debug, Default)]
pub struct PostEffectInstance {
    pub effect_id: EffectId,
    pub enabled: bool,
    /// Overridden parameter values; missing ones fall back to defaults.
    pub params: HashMap<String, f32>,
}

impl PostEffectInstance {
    pub fn new(effect_id: impl Into<String>) -> Self {
        Self {
            effect_id: effect_id.into(),
            enabled: true,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: f32) {
        self.params.insert(name.into(), value);
    }

    pub fn get_param(&self, name: &str) -> Option<f32> {
        self.params.get(name).copied()
    }
}

/// One resolved stage, ready for the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct PostStage {
    pub effect_id: EffectId,
    pub stage_code: u32,
    /// Parameter values in definition order, zero padded.
    pub values: [f32; MAX_STAGE_PARAMS],
}

/// The post-processing chain - ordered list of effects to apply.
#[derive(Clone, Debug, Default)]
pub struct PostProcessingChain {
    pub effects: Vec<PostEffectInstance>,
}

impl PostProcessingChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chain every dreamscape starts with.
    pub fn dream_default() -> Self {
        let mut chain = Self::new();
        chain.add(PostEffectInstance::new("bloom"));
        chain.add(PostEffectInstance::new("chromatic_aberration"));
        chain.add(PostEffectInstance::new("vignette"));
        chain.add(PostEffectInstance::new("fade"));
        chain
    }

    /// Add an effect to the end of the chain.
    pub fn add(&mut self, effect: PostEffectInstance) {
        self.effects.push(effect);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Enable or disable every instance of an effect. Returns false if the
    /// effect isn't in the chain.
    pub fn set_enabled(&mut self, effect_id: &str, enabled: bool) -> bool {
        let mut found = false;
        for effect in self.effects.iter_mut().filter(|e| e.effect_id == effect_id) {
            effect.enabled = enabled;
            found = true;
        }
        found
    }

    /// Set a parameter on every instance of an effect. Returns false if the
    /// effect isn't in the chain.
    pub fn set_param(&mut self, effect_id: &str, name: &str, value: f32) -> bool {
        let mut found = false;
        for effect in self.effects.iter_mut().filter(|e| e.effect_id == effect_id) {
            effect.set_param(name, value);
            found = true;
        }
        found
    }

    pub fn get(&self, effect_id: &str) -> Option<&PostEffectInstance> {
        self.effects.iter().find(|e| e.effect_id == effect_id)
    }

    /// Resolve enabled effects into ordered stages.
    ///
    /// Instances naming an unknown effect are skipped.
    pub fn resolve(&self, registry: &PostEffectRegistry) -> Vec<PostStage> {
        let mut stages = Vec::with_capacity(self.effects.len());
        for effect in self.effects.iter().filter(|e| e.enabled) {
            let Some(def) = registry.get(&effect.effect_id) else {
                continue;
            };
            let mut values = [0.0; MAX_STAGE_PARAMS];
            for (slot, param_def) in values.iter_mut().zip(&def.params) {
                let value = effect.get_param(&param_def.name).unwrap_or(param_def.default_value);
                *slot = param_def.clamp(value);
            }
            stages.push(PostStage {
                effect_id: def.id.clone(),
                stage_code: def.stage_code,
                values,
            });
        }
        stages
    }
}

/// Registry of available post-processing effects.
pub struct PostEffectRegistry {
    effects: HashMap<EffectId, PostEffect>,
}

impl PostEffectRegistry {
    /// Create a new registry with built-in effects.
    pub fn new() -> Self {
        let mut registry = Self {
            effects: HashMap::new(),
        };
        registry.register_builtin_effects();
        registry
    }

    // Stage codes must match the switch in gpu/post.wgsl
    fn register_builtin_effects(&mut self) {
        self.register(
            PostEffect::builder("bloom")
                .stage_code(1)
                .param(EffectParamDef::float("threshold", 0.7).with_range(0.0, 2.0))
                .param(EffectParamDef::float("strength", 0.6).with_range(0.0, 3.0))
                .param(EffectParamDef::float("radius", 3.0).with_range(0.0, 8.0))
                .build(),
        );

        self.register(
            PostEffect::builder("vignette")
                .stage_code(2)
                .param(EffectParamDef::float("intensity", 0.35).with_range(0.0, 1.0))
                .param(EffectParamDef::float("smoothness", 0.5).with_range(0.0, 1.0))
                .build(),
        );

        self.register(
            PostEffect::builder("chromatic_aberration")
                .stage_code(3)
                .param(EffectParamDef::float("amount", 1.5).with_range(0.0, 10.0))
                .build(),
        );

        self.register(
            PostEffect::builder("fade")
                .stage_code(4)
                .param(EffectParamDef::float("opacity", 0.0).with_range(0.0, 1.0))
                .build(),
        );
    }

    /// Register a new effect.
    pub fn register(&mut self, effect: PostEffect) {
        if effect.params.len() > MAX_STAGE_PARAMS {
            log::warn!(
                "Effect '{}' declares {} params; only the first {} reach the GPU",
                effect.id,
                effect.params.len(),
                MAX_STAGE_PARAMS
            );
        }
        self.effects.insert(effect.id.clone(), effect);
    }

    pub fn get(&self, id: &str) -> Option<&PostEffect> {
        self.effects.get(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.effects.contains_key(id)
    }
}

impl Default for PostEffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_builtin_effects() {
        let registry = PostEffectRegistry::new();
        for id in ["bloom", "vignette", "chromatic_aberration", "fade"] {
            assert!(registry.exists(id), "missing {}", id);
        }
    }

    #[test]
    fn test_set_enabled_reports_missing_effect() {
        let mut chain = PostProcessingChain::dream_default();
        assert!(!chain.is_empty());

        assert!(chain.set_enabled("chromatic_aberration", false));
        assert!(!chain.get("chromatic_aberration").unwrap().enabled);
        assert!(chain.get("bloom").unwrap().enabled);

        assert!(!chain.set_enabled("film_grain", false));
        assert!(!chain.set_param("film_grain", "amount", 0.1));
    }

    #[test]
    fn test_resolve_keeps_order_and_defaults() {
        let registry = PostEffectRegistry::new();
        let mut chain = PostProcessingChain::dream_default();
        chain.set_param("bloom", "strength", 1.2);
        chain.add(PostEffectInstance::new("does_not_exist"));

        let stages = chain.resolve(&registry);
        let ids: Vec<_> = stages.iter().map(|s| s.effect_id.as_str()).collect();
        assert_eq!(ids, vec!["bloom", "chromatic_aberration", "vignette", "fade"]);
        assert_eq!(stages[0].values, [0.7, 1.2, 3.0]);
        assert_eq!(stages[3].values, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_resolve_clamps_to_range() {
        let registry = PostEffectRegistry::new();
        let mut chain = PostProcessingChain::new();
        chain.add(PostEffectInstance::new("fade").with_param("opacity", 4.0));
        chain.add(PostEffectInstance::new("vignette").with_param("intensity", f32::NAN));

        let stages = chain.resolve(&registry);
        assert_eq!(stages[0].values[0], 1.0);
        assert_eq!(stages[1].values[0], 0.35);
    }

    #[test]
    fn test_disabled_effects_skipped() {
        let registry = PostEffectRegistry::new();
        let mut chain = PostProcessingChain::dream_default();
        chain.set_enabled("vignette", false);
        assert!(chain.resolve(&registry).iter().all(|s| s.effect_id != "vignette"));
    }
}
