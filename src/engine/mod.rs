// Engine module - scene graph, lobby simulation and the wgpu front end.
// Everything below `renderer`/`debug_overlay` is GPU-agnostic and unit tested.

pub mod camera;
pub mod collision;
pub mod config;
pub mod debug_overlay;
pub mod error;
pub mod geometry;
pub mod input;
pub mod lifecycle;
pub mod mesh;
pub mod node;
pub mod particle;
pub mod registry;
pub mod renderer;
pub mod scene;
pub mod transform;

// Re-export commonly used items
pub use config::SceneConfig;
pub use error::{ConfigError, RenderError};
pub use scene::Scene;
