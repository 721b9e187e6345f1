//! GPU textures and texture sets.
//!
//! This module provides [`Texture`], a wrapper around a WGPU texture and its
//! default view, helpers for the depth, shadow, cube and render-target textures
//! the renderer needs, and [`TextureSet`], the group of textures a model samples.

use anyhow::Result;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

use crate::error::RenderError;

/// Most 2D textures a [`TextureSet`] binds.
pub const MAX_SET_TEXTURES: usize = 2;

/// A GPU texture with its default view.
///
/// Typically created via [`from_bytes`](Self::from_bytes) or one of the
/// `create_*` helpers.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create the main depth buffer.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Create a square depth texture array with one layer per shadow-casting light.
    ///
    /// Returns the texture (its view covers every layer, for sampling) and one
    /// single-layer view per layer to render into.
    pub fn create_shadow_array(
        device: &wgpu::Device,
        size: u32,
        layers: u32,
    ) -> (Self, Vec<wgpu::TextureView>) {
        let layers = layers.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow map array"),
            size: wgpu::Extent3d {
                width: size.max(1),
                height: size.max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow map array view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            array_layer_count: Some(layers),
            ..Default::default()
        });
        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("shadow map layer"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        (Self { texture, view }, layer_views)
    }

    /// Create a colour texture that can be rendered to, sampled and copied out.
    pub fn create_render_target(
        device: &wgpu::Device,
        size: [u32; 2],
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0].max(1),
                height: size[1].max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Create a texture filled with a single colour.
    ///
    /// Used where a material slot has nothing bound, so shaders never need to
    /// branch on a missing texture.
    pub fn create_solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_rgba(queue, &texture, &rgba, 1, 1, 0);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Create a cube map with the same colour on every face.
    pub fn create_solid_cube(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        label: &str,
    ) -> Self {
        let texture = create_cube_texture(device, 1, label);
        for face in 0..6 {
            write_rgba(queue, &texture, &rgba, 1, 1, face);
        }
        let view = cube_view(&texture);
        Self { texture, view }
    }

    /// Create a cube map from six square faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn cube_from_images(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[image::DynamicImage; 6],
        label: &str,
    ) -> Result<Self> {
        let (width, height) = faces[0].dimensions();
        if width != height || faces.iter().any(|face| face.dimensions() != (width, height)) {
            anyhow::bail!("cube map `{label}` needs six square faces of equal size");
        }
        let texture = create_cube_texture(device, width, label);
        for (layer, face) in faces.iter().enumerate() {
            write_rgba(queue, &texture, &face.to_rgba8(), width, height, layer as u32);
        }
        let view = cube_view(&texture);
        Ok(Self { texture, view })
    }

    /// Load a texture from raw byte data (image file contents).
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data (PNG, JPEG, etc.)
    /// * `label` is used as a debug name for the GPU resource
    /// * `format`  is an optional file format hint (e.g., "png"). If None, auto-detect.
    /// * `is_normal_map` toggles between sRGB (false) and linear (true) color space
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
        is_normal_map: bool,
    ) -> Result<Self> {
        let img = match format.and_then(|ext| ImageFormat::from_extension(ext)) {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        };
        Self::from_image(device, queue, &img, Some(label), is_normal_map)
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
        is_normal_map: bool,
    ) -> Result<Self> {
        let dimensions = img.dimensions();
        let rgba = img.to_rgba8();

        let format = if is_normal_map {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width: dimensions.0,
                height: dimensions.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_rgba(queue, &texture, &rgba, dimensions.0, dimensions.1, 0);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self { texture, view })
    }
}

fn create_cube_texture(device: &wgpu::Device, size: u32, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn cube_view(texture: &wgpu::Texture) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::Cube),
        array_layer_count: Some(6),
        ..Default::default()
    })
}

fn write_rgba(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    rgba: &[u8],
    width: u32,
    height: u32,
    layer: u32,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

/// One or two named 2D textures plus an optional cube map.
///
/// Slot 0 is the diffuse (or first fade) texture, slot 1 the second fade
/// texture or normal/height map. Slot `i` always binds texture `i`.
#[derive(Debug, Clone)]
pub struct TextureSet {
    names: Vec<String>,
    textures: Vec<Texture>,
    cube: Option<Texture>,
}

impl TextureSet {
    pub fn new(textures: Vec<(String, Texture)>) -> Result<Self, RenderError> {
        check_slot_count(textures.len())?;
        let (names, textures) = textures.into_iter().unzip();
        Ok(Self {
            names,
            textures,
            cube: None,
        })
    }

    pub fn single(name: impl Into<String>, texture: Texture) -> Self {
        Self {
            names: vec![name.into()],
            textures: vec![texture],
            cube: None,
        }
    }

    pub fn with_cube(mut self, cube: Texture) -> Self {
        self.cube = Some(cube);
        self
    }

    pub fn slot(&self, slot: usize) -> Option<&Texture> {
        self.textures.get(slot)
    }

    pub fn name(&self, slot: usize) -> Option<&str> {
        self.names.get(slot).map(String::as_str)
    }

    pub fn cube(&self) -> Option<&Texture> {
        self.cube.as_ref()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Bind this set to the material layout. Empty slots fall back to `defaults`.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        defaults: &DefaultTextures,
    ) -> wgpu::BindGroup {
        let first = self.slot(0).unwrap_or(&defaults.white);
        let second = self.slot(1).unwrap_or(&defaults.white);
        let cube = self.cube().unwrap_or(&defaults.cube);
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} material bind group", self.name(0).unwrap_or("unnamed"))),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&first.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&second.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&cube.view),
                },
            ],
        })
    }
}

pub(crate) fn check_slot_count(count: usize) -> Result<(), RenderError> {
    match count {
        0 => Err(RenderError::EmptyTextureSet),
        n if n > MAX_SET_TEXTURES => Err(RenderError::TooManyTextures {
            max: MAX_SET_TEXTURES,
            got: n,
        }),
        _ => Ok(()),
    }
}

/// Placeholders bound where a material slot has no texture.
#[derive(Debug)]
pub struct DefaultTextures {
    pub white: Texture,
    pub cube: Texture,
}

impl DefaultTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            white: Texture::create_solid(device, queue, [255, 255, 255, 255], "default white"),
            cube: Texture::create_solid_cube(device, queue, [255, 255, 255, 255], "default cube"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_or_two_textures_are_accepted() {
        assert!(check_slot_count(1).is_ok());
        assert!(check_slot_count(2).is_ok());
    }

    #[test]
    fn empty_and_oversized_sets_are_rejected() {
        assert!(matches!(check_slot_count(0), Err(RenderError::EmptyTextureSet)));
        assert!(matches!(
            check_slot_count(3),
            Err(RenderError::TooManyTextures { max: 2, got: 3 })
        ));
    }
}
