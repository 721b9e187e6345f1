//! Error taxonomy for scene setup and rendering.
//!
//! Setup functions return `anyhow::Result` so callers can attach the asset
//! name that failed; the typed [`RenderError`] is the root cause inside.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no shader source registered under `{0}`")]
    ShaderMissing(String),

    #[error("could not load texture `{name}`")]
    TextureLoad {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("a texture set binds at most {max} 2D textures, got {got}")]
    TooManyTextures { max: usize, got: usize },

    #[error("a texture set needs at least one texture")]
    EmptyTextureSet,

    #[error("could not load mesh `{name}`: {reason}")]
    MeshLoad { name: String, reason: String },

    #[error("mesh `{name}` has {got} nodes, at most {max} are supported")]
    TooManyBones { name: String, max: usize, got: usize },

    #[error("unsupported mesh format `{0}`")]
    UnsupportedMeshFormat(String),

    #[error("`{tag}` is not a valid {kind} tag")]
    InvalidTag { kind: &'static str, tag: i32 },

    #[error("a scene holds at most {max} lights, got {got}")]
    TooManyLights { max: usize, got: usize },

    #[error("no suitable graphics adapter found")]
    NoAdapter,

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
