use anyhow::Context as _;

use crate::{
    data_structures::texture::{Texture, TextureSet, check_slot_count},
    error::RenderError,
    resources::{extension, load_binary},
};

/// Load one image file. Normal and height maps must be loaded with
/// `is_normal_map` so they are not treated as sRGB.
pub async fn load_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    file_name: &str,
    is_normal_map: bool,
) -> anyhow::Result<Texture> {
    let loaded = async {
        let data = load_binary(file_name).await?;
        let format = extension(file_name);
        Texture::from_bytes(device, queue, &data, file_name, format.as_deref(), is_normal_map)
    }
    .await;
    loaded.map_err(|source| {
        RenderError::TextureLoad {
            name: file_name.to_string(),
            source,
        }
        .into()
    })
}

/// One or two colour textures, bound to slots 0 and 1 in order.
pub async fn load_texture_set(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    file_names: &[&str],
) -> anyhow::Result<TextureSet> {
    check_slot_count(file_names.len())?;
    let loaded = futures::future::try_join_all(
        file_names
            .iter()
            .map(|&name| load_texture(device, queue, name, false)),
    )
    .await?;
    log::debug!("loaded texture set {file_names:?}");
    let named = file_names.iter().map(|name| name.to_string()).zip(loaded).collect();
    Ok(TextureSet::new(named)?)
}

/// A diffuse texture with a normal map (alpha holding height for parallax
/// mapping) in slot 1.
pub async fn load_normal_mapped_set(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    diffuse: &str,
    normal: &str,
) -> anyhow::Result<TextureSet> {
    let diffuse_texture = load_texture(device, queue, diffuse, false).await?;
    let normal_texture = load_texture(device, queue, normal, true).await?;
    Ok(TextureSet::new(vec![
        (diffuse.to_string(), diffuse_texture),
        (normal.to_string(), normal_texture),
    ])?)
}

/// Six faces in +X, -X, +Y, -Y, +Z, -Z order.
pub async fn load_cube_map(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    faces: [&str; 6],
    label: &str,
) -> anyhow::Result<Texture> {
    let mut images = Vec::with_capacity(6);
    for face in faces {
        let data = load_binary(face)
            .await
            .with_context(|| format!("cube map `{label}` face `{face}`"))?;
        images.push(image::load_from_memory(&data).with_context(|| format!("decoding `{face}`"))?);
    }
    let images: [image::DynamicImage; 6] = images
        .try_into()
        .map_err(|_| anyhow::anyhow!("cube map `{label}` needs six faces"))?;
    Texture::cube_from_images(device, queue, &images, label)
}
