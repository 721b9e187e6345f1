//! Fixed-function state selectable per drawable.
//!
//! The integer tags match the values scene scripts used historically and can
//! be converted with `TryFrom<i32>`.

use crate::data_structures::texture::Texture;

macro_rules! tagged_enum {
    ($name:ident, $kind:literal, { $($variant:ident = $tag:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn tag(self) -> i32 {
                self as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = $crate::error::RenderError;

            fn try_from(tag: i32) -> Result<Self, Self::Error> {
                match tag {
                    $($tag => Ok($name::$variant),)+
                    _ => Err($crate::error::RenderError::InvalidTag { kind: $kind, tag }),
                }
            }
        }
    };
}
pub(crate) use tagged_enum;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendType {
    #[default]
    NoBlend = 1,
    Additive = 2,
    Multiplicative = 3,
    Alpha = 4,
}
tagged_enum!(BlendType, "blend", { NoBlend = 1, Additive = 2, Multiplicative = 3, Alpha = 4 });

impl BlendType {
    pub fn blend_state(self) -> Option<wgpu::BlendState> {
        match self {
            BlendType::NoBlend => Some(wgpu::BlendState::REPLACE),
            BlendType::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::REPLACE,
            }),
            BlendType::Multiplicative => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Dst,
                    dst_factor: wgpu::BlendFactor::Zero,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::REPLACE,
            }),
            BlendType::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        }
    }

    /// Blended geometry is drawn after all opaque geometry.
    pub fn is_blended(self) -> bool {
        self != BlendType::NoBlend
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullType {
    #[default]
    Back = 1,
    Front = 2,
    None = 3,
}
tagged_enum!(CullType, "cull", { Back = 1, Front = 2, None = 3 });

impl CullType {
    pub fn face(self) -> Option<wgpu::Face> {
        match self {
            CullType::Back => Some(wgpu::Face::Back),
            CullType::Front => Some(wgpu::Face::Front),
            CullType::None => None,
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthType {
    #[default]
    UseDepth = 1,
    ReadOnly = 2,
    NoDepth = 3,
}
tagged_enum!(DepthType, "depth", { UseDepth = 1, ReadOnly = 2, NoDepth = 3 });

impl DepthType {
    pub fn depth_stencil(self) -> wgpu::DepthStencilState {
        let (depth_write_enabled, depth_compare) = match self {
            DepthType::UseDepth => (true, wgpu::CompareFunction::Less),
            DepthType::ReadOnly => (false, wgpu::CompareFunction::Less),
            DepthType::NoDepth => (false, wgpu::CompareFunction::Always),
        };
        wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerType {
    Point = 1,
    Trilinear = 2,
    #[default]
    Anisotropic4x = 3,
}
tagged_enum!(SamplerType, "sampler", { Point = 1, Trilinear = 2, Anisotropic4x = 3 });

impl SamplerType {
    pub fn descriptor(self) -> wgpu::SamplerDescriptor<'static> {
        let (filter, mipmap_filter, anisotropy_clamp, label) = match self {
            SamplerType::Point => (
                wgpu::FilterMode::Nearest,
                wgpu::MipmapFilterMode::Nearest,
                1,
                "point sampler",
            ),
            SamplerType::Trilinear => (
                wgpu::FilterMode::Linear,
                wgpu::MipmapFilterMode::Linear,
                1,
                "trilinear sampler",
            ),
            SamplerType::Anisotropic4x => (
                wgpu::FilterMode::Linear,
                wgpu::MipmapFilterMode::Linear,
                4,
                "anisotropic 4x sampler",
            ),
        };
        wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter,
            anisotropy_clamp,
            ..Default::default()
        }
    }
}

/// One sampler per [`SamplerType`], created once and shared by every material.
#[derive(Debug)]
pub struct Samplers {
    point: wgpu::Sampler,
    trilinear: wgpu::Sampler,
    anisotropic: wgpu::Sampler,
    /// Depth comparison sampler for the shadow map array.
    pub shadow: wgpu::Sampler,
    /// Clamped linear sampler for full-screen passes.
    pub post: wgpu::Sampler,
}

impl Samplers {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            point: device.create_sampler(&SamplerType::Point.descriptor()),
            trilinear: device.create_sampler(&SamplerType::Trilinear.descriptor()),
            anisotropic: device.create_sampler(&SamplerType::Anisotropic4x.descriptor()),
            shadow: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("shadow comparison sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                compare: Some(wgpu::CompareFunction::LessEqual),
                ..Default::default()
            }),
            post: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("post-process sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }),
        }
    }

    pub fn get(&self, sampler: SamplerType) -> &wgpu::Sampler {
        match sampler {
            SamplerType::Point => &self.point,
            SamplerType::Trilinear => &self.trilinear,
            SamplerType::Anisotropic4x => &self.anisotropic,
        }
    }
}
