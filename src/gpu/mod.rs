pub mod mesh;
pub mod pipeline;
pub mod post_processor;
pub mod renderer;
pub mod surface;

#[cfg(not(target_arch = "wasm32"))]
pub mod offscreen;
