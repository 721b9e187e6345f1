//! Scene data: geometry, per-instance poses and textures.
//!
//! - `mesh` holds immutable GPU geometry and its node (bone) hierarchy
//! - `model` holds the per-instance node transforms over a mesh
//! - `texture` wraps GPU textures and the texture sets materials bind
pub mod mesh;
pub mod model;
pub mod texture;
