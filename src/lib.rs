pub mod camera;
pub mod config;
pub mod easing;
pub mod focus;
pub mod frame;
pub mod gpu;
pub mod interaction;
pub mod material;
pub mod particle;
pub mod physics;
pub mod post_processing;
pub mod raycast;
pub mod render;
pub mod scene_graph;
pub mod shader_animator;
pub mod worlds;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;
#[cfg(not(target_arch = "wasm32"))]
pub mod window;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
