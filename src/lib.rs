//! forward-ngin
//!
//! A small forward renderer for native and WASM targets. A [`scene::Scene`]
//! owns models, lights and a camera; every frame it renders a depth-only pass
//! per shadow-casting light, then the scene from the camera with per-model
//! shaders and render state, and optionally a full-screen post-processing
//! effect.
//!
//! High-level modules
//! - `context`: device, queue and the surface or off-screen frame target
//! - `scene`: scene setup, per-frame update and the render passes
//! - `scene_model` and `light`: the drawables a scene holds
//! - `material` and `pipelines`: shader and fixed-function state selection
//! - `data_structures`: meshes, model poses and textures
//! - `resources`: loading textures and meshes from `assets/`
//! - `flow`: the windowed event loop
//!

pub mod camera;
pub mod capture;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod input;
pub mod light;
pub mod material;
pub mod math;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod scene_model;
pub mod uniforms;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit::keyboard::KeyCode;
