//! The fixed render-state tuple each drawable is created with.

use crate::pipelines::{
    PipelineKey,
    shader::{PixelShader, VertexShader},
    state::{BlendType, CullType, DepthType, SamplerType},
};

/// Shaders plus fixed-function state for one drawable. Textures live in the
/// [`TextureSet`](crate::data_structures::texture::TextureSet) next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Material {
    pub vertex: VertexShader,
    pub pixel: PixelShader,
    pub blend: BlendType,
    pub depth: DepthType,
    pub cull: CullType,
    pub sampler: SamplerType,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            vertex: VertexShader::PixelLighting,
            pixel: PixelShader::PixelLighting,
            blend: BlendType::NoBlend,
            depth: DepthType::UseDepth,
            cull: CullType::Back,
            sampler: SamplerType::Anisotropic4x,
        }
    }
}

impl Material {
    /// Unlit and blended. Blended geometry tests depth but does not write it,
    /// and both faces are drawn.
    fn blended(pixel: PixelShader, blend: BlendType) -> Self {
        Self {
            vertex: VertexShader::BasicTransform,
            pixel,
            blend,
            depth: DepthType::ReadOnly,
            cull: CullType::None,
            ..Default::default()
        }
    }

    pub fn additive() -> Self {
        Self::blended(PixelShader::LightModel, BlendType::Additive)
    }

    pub fn multiplicative() -> Self {
        Self::blended(PixelShader::TextureAlpha, BlendType::Multiplicative)
    }

    pub fn alpha() -> Self {
        Self::blended(PixelShader::TextureAlpha, BlendType::Alpha)
    }

    /// How light models are drawn: additive, tinted by the light colour.
    pub fn light_model() -> Self {
        Self::additive()
    }

    pub fn skinned() -> Self {
        Self {
            vertex: VertexShader::Skinning,
            ..Default::default()
        }
    }

    pub fn wiggle() -> Self {
        Self {
            vertex: VertexShader::Wiggle,
            ..Default::default()
        }
    }

    /// Cross-fades between the first and second texture of the set.
    pub fn texture_fade() -> Self {
        Self {
            pixel: PixelShader::TextureFade,
            ..Default::default()
        }
    }

    pub fn cell_shading() -> Self {
        Self {
            pixel: PixelShader::CellShading,
            ..Default::default()
        }
    }

    /// The inflated silhouette drawn before a model with an outline.
    pub fn outline() -> Self {
        Self {
            vertex: VertexShader::CellShadingOutline,
            pixel: PixelShader::CellShadingOutline,
            cull: CullType::Front,
            ..Default::default()
        }
    }

    pub fn normal_mapping() -> Self {
        Self {
            vertex: VertexShader::NormalMapping,
            pixel: PixelShader::NormalMap,
            ..Default::default()
        }
    }

    pub fn parallax_mapping() -> Self {
        Self {
            vertex: VertexShader::NormalMapping,
            pixel: PixelShader::ParallaxMap,
            ..Default::default()
        }
    }

    pub fn cube_map() -> Self {
        Self {
            vertex: VertexShader::CubeMap,
            pixel: PixelShader::CubeMap,
            ..Default::default()
        }
    }

    pub fn tinted() -> Self {
        Self {
            pixel: PixelShader::PixelLightingWithTint,
            ..Default::default()
        }
    }

    pub fn with_vertex(mut self, vertex: VertexShader) -> Self {
        self.vertex = vertex;
        self
    }

    pub fn with_pixel(mut self, pixel: PixelShader) -> Self {
        self.pixel = pixel;
        self
    }

    pub fn with_blend(mut self, blend: BlendType) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_depth(mut self, depth: DepthType) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_cull(mut self, cull: CullType) -> Self {
        self.cull = cull;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn is_blended(&self) -> bool {
        self.blend.is_blended()
    }

    /// The sampler is a bind group choice, so it is not part of the key.
    pub fn pipeline_key(&self) -> PipelineKey {
        PipelineKey {
            vertex: self.vertex,
            pixel: self.pixel,
            blend: self.blend,
            depth: self.depth,
            cull: self.cull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_opaque_pixel_lighting() {
        let material = Material::default();
        assert_eq!(material.vertex, VertexShader::PixelLighting);
        assert_eq!(material.pixel, PixelShader::PixelLighting);
        assert!(!material.is_blended());
        assert_eq!(material.sampler, SamplerType::Anisotropic4x);
    }

    #[test]
    fn blended_presets_keep_depth_read_only() {
        for material in [Material::additive(), Material::multiplicative(), Material::alpha()] {
            assert!(material.is_blended());
            assert_eq!(material.depth, DepthType::ReadOnly);
            assert_eq!(material.cull, CullType::None);
            assert_eq!(material.vertex, VertexShader::BasicTransform);
        }
        assert_eq!(Material::light_model().pixel, PixelShader::LightModel);
        assert_eq!(Material::light_model().blend, BlendType::Additive);
    }

    #[test]
    fn outline_culls_front_faces() {
        let outline = Material::outline();
        assert_eq!(outline.cull, CullType::Front);
        assert_eq!(outline.pixel, PixelShader::CellShadingOutline);
    }

    #[test]
    fn sampler_does_not_change_pipeline() {
        let trilinear = Material::default().with_sampler(SamplerType::Trilinear);
        assert_eq!(trilinear.pipeline_key(), Material::default().pipeline_key());
        assert_ne!(
            Material::default().with_cull(CullType::None).pipeline_key(),
            Material::default().pipeline_key()
        );
    }
}
