//! Shader programs by name.
//!
//! Every program lives in `shaders/<name>_vs.wgsl`, `<name>_ps.wgsl` or
//! `<name>_pp.wgsl` and is compiled into the binary. Before compilation the
//! source is prefixed with the prelude of the pass it belongs to, which
//! declares the uniform structs and bind groups.

use crate::{error::RenderError, pipelines::post::PostProcess};

/// Declares a shader enum together with its snake case file stem.
macro_rules! shader_names {
    ($name:ident { $($variant:ident => $stem:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn stem(self) -> &'static str {
                match self {
                    $($name::$variant => $stem),+
                }
            }
        }
    };
}

shader_names!(VertexShader {
    PixelLighting => "pixel_lighting",
    BasicTransform => "basic_transform",
    Skinning => "skinning",
    Wiggle => "wiggle",
    NormalMapping => "normal_mapping",
    CellShadingOutline => "cell_shading_outline",
    CubeMap => "cube_map",
    ShadowDepth => "shadow_depth",
    FullScreenQuad => "full_screen_quad",
});

shader_names!(PixelShader {
    PixelLighting => "pixel_lighting",
    LightModel => "light_model",
    TextureFade => "texture_fade",
    TextureAlpha => "texture_alpha",
    DepthOnly => "depth_only",
    NormalMap => "normal_map",
    ParallaxMap => "parallax_map",
    CellShadingOutline => "cell_shading_outline",
    CellShading => "cell_shading",
    CubeMap => "cube_map",
    PixelLightingWithTint => "pixel_lighting_with_tint",
});

/// Which set of bind group declarations a program is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prelude {
    Scene,
    Shadow,
    Post,
}

impl Prelude {
    fn files(self) -> &'static [&'static str] {
        match self {
            Prelude::Scene => &["common.wgsl", "scene.wgsl"],
            Prelude::Shadow => &["common.wgsl", "shadow.wgsl"],
            Prelude::Post => &["post.wgsl"],
        }
    }
}

impl VertexShader {
    pub fn file_name(self) -> String {
        format!("{}_vs.wgsl", self.stem())
    }

    pub fn prelude(self) -> Prelude {
        match self {
            VertexShader::ShadowDepth => Prelude::Shadow,
            VertexShader::FullScreenQuad => Prelude::Post,
            _ => Prelude::Scene,
        }
    }
}

impl PixelShader {
    pub fn file_name(self) -> String {
        format!("{}_ps.wgsl", self.stem())
    }

    pub fn prelude(self) -> Prelude {
        match self {
            PixelShader::DepthOnly => Prelude::Shadow,
            _ => Prelude::Scene,
        }
    }
}

macro_rules! sources {
    ($($file:literal),+ $(,)?) => {
        &[$(($file, include_str!(concat!("shaders/", $file)))),+]
    };
}

static SOURCES: &[(&str, &str)] = sources![
    "common.wgsl",
    "scene.wgsl",
    "shadow.wgsl",
    "post.wgsl",
    "pixel_lighting_vs.wgsl",
    "basic_transform_vs.wgsl",
    "skinning_vs.wgsl",
    "wiggle_vs.wgsl",
    "normal_mapping_vs.wgsl",
    "cell_shading_outline_vs.wgsl",
    "cube_map_vs.wgsl",
    "shadow_depth_vs.wgsl",
    "full_screen_quad_vs.wgsl",
    "pixel_lighting_ps.wgsl",
    "light_model_ps.wgsl",
    "texture_fade_ps.wgsl",
    "texture_alpha_ps.wgsl",
    "depth_only_ps.wgsl",
    "normal_map_ps.wgsl",
    "parallax_map_ps.wgsl",
    "cell_shading_outline_ps.wgsl",
    "cell_shading_ps.wgsl",
    "cube_map_ps.wgsl",
    "pixel_lighting_with_tint_ps.wgsl",
    "tint_pp.wgsl",
    "grey_noise_pp.wgsl",
    "burn_pp.wgsl",
    "distort_pp.wgsl",
    "spiral_pp.wgsl",
];

fn source(file_name: &str) -> Result<&'static str, RenderError> {
    SOURCES
        .iter()
        .find(|(name, _)| *name == file_name)
        .map(|(_, source)| *source)
        .ok_or_else(|| RenderError::ShaderMissing(file_name.to_string()))
}

/// Prelude followed by the program body, ready for `create_shader_module`.
pub(crate) fn resolve_source(file_name: &str, prelude: Prelude) -> Result<String, RenderError> {
    let mut full = String::new();
    for part in prelude.files() {
        full.push_str(source(part)?);
        full.push('\n');
    }
    full.push_str(source(file_name)?);
    Ok(full)
}

/// Every program, compiled once.
#[derive(Debug)]
pub struct ShaderLibrary {
    vertex: Vec<wgpu::ShaderModule>,
    pixel: Vec<wgpu::ShaderModule>,
    post: Vec<wgpu::ShaderModule>,
}

impl ShaderLibrary {
    /// Compile all programs. Fails with [`RenderError::ShaderMissing`] naming
    /// the first file that is not registered.
    pub fn load(device: &wgpu::Device) -> anyhow::Result<Self> {
        let compile = |file_name: String, prelude: Prelude| -> Result<wgpu::ShaderModule, RenderError> {
            let source = resolve_source(&file_name, prelude)?;
            Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&file_name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            }))
        };

        let vertex = VertexShader::ALL
            .iter()
            .map(|s| compile(s.file_name(), s.prelude()))
            .collect::<Result<Vec<_>, _>>()?;
        let pixel = PixelShader::ALL
            .iter()
            .map(|s| compile(s.file_name(), s.prelude()))
            .collect::<Result<Vec<_>, _>>()?;
        let post = PostProcess::ALL
            .iter()
            .map(|p| compile(p.file_name(), Prelude::Post))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "compiled {} vertex, {} pixel and {} post-processing shaders",
            vertex.len(),
            pixel.len(),
            post.len()
        );
        Ok(Self {
            vertex,
            pixel,
            post,
        })
    }

    pub fn vertex(&self, shader: VertexShader) -> &wgpu::ShaderModule {
        &self.vertex[shader as usize]
    }

    pub fn pixel(&self, shader: PixelShader) -> &wgpu::ShaderModule {
        &self.pixel[shader as usize]
    }

    pub fn post(&self, effect: PostProcess) -> &wgpu::ShaderModule {
        &self.post[effect as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_program_has_a_source() {
        for shader in VertexShader::ALL {
            let source = resolve_source(&shader.file_name(), shader.prelude()).unwrap();
            assert!(source.contains("fn vs_main"), "{shader:?}");
        }
        for shader in PixelShader::ALL {
            let source = resolve_source(&shader.file_name(), shader.prelude()).unwrap();
            assert!(source.contains("fn fs_main"), "{shader:?}");
        }
        for effect in PostProcess::ALL {
            let source = resolve_source(&effect.file_name(), Prelude::Post).unwrap();
            assert!(source.contains("fn fs_main"), "{effect:?}");
        }
    }

    #[test]
    fn missing_program_is_named() {
        let err = resolve_source("sepia_pp.wgsl", Prelude::Post).unwrap_err();
        assert!(matches!(err, RenderError::ShaderMissing(ref name) if name == "sepia_pp.wgsl"));
    }

    #[test]
    fn file_names_follow_convention() {
        assert_eq!(VertexShader::CellShadingOutline.file_name(), "cell_shading_outline_vs.wgsl");
        assert_eq!(PixelShader::PixelLightingWithTint.file_name(), "pixel_lighting_with_tint_ps.wgsl");
        assert_eq!(VertexShader::ShadowDepth.prelude(), Prelude::Shadow);
        assert_eq!(PixelShader::DepthOnly.prelude(), Prelude::Shadow);
        assert_eq!(VertexShader::FullScreenQuad.prelude(), Prelude::Post);
    }

    #[test]
    fn scene_prelude_declares_bind_groups() {
        let source = resolve_source(&PixelShader::PixelLighting.file_name(), Prelude::Scene).unwrap();
        assert!(source.contains("var<uniform> frame: PerFrame"));
        assert!(source.contains("var<uniform> model: PerModel"));
        assert!(source.contains("texture_depth_2d_array"));
    }

    #[test]
    fn outlines_follow_skinned_bones() {
        for shader in [VertexShader::Skinning, VertexShader::CellShadingOutline] {
            let source = resolve_source(&shader.file_name(), shader.prelude()).unwrap();
            assert!(source.contains("lit_vertex(input, skin_matrix(input))"), "{shader:?}");
        }
    }

    #[test]
    fn directional_lighting_never_normalises_zero() {
        let source = resolve_source(&PixelShader::PixelLighting.file_name(), Prelude::Scene).unwrap();
        assert!(!source.contains("normalize(light.position)"));
        assert!(source.contains("max(distance, 0.0001)"));
    }
}
