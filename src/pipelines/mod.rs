//! Bind group layouts and the pipeline state table.
//!
//! Every scene pipeline shares one layout: per-frame data and shadow maps in
//! group 0, per-model constants in group 1 and material textures in group 2.
//! A [`PipelineKey`] names one combination of shaders and fixed-function state;
//! [`PipelineCache`] builds each combination once, the first time a drawable
//! with that key is prepared.

use std::collections::HashMap;

use crate::{
    data_structures::mesh::{ModelVertex, Vertex},
    pipelines::{
        shader::{PixelShader, ShaderLibrary, VertexShader},
        state::{BlendType, CullType, DepthType},
    },
    uniforms::{PerFrameConstants, PerModelConstants, PostProcessingConstants, ShadowPassConstants},
};

pub mod post;
pub mod shader;
pub mod shadow;
pub mod state;

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: usize,
    has_dynamic_offset: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, ty: wgpu::SamplerBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(ty),
        count: None,
    }
}

#[derive(Debug)]
pub struct Layouts {
    /// Per-frame constants, shadow map array, comparison sampler.
    pub frame: wgpu::BindGroupLayout,
    pub model: wgpu::BindGroupLayout,
    /// Two 2D textures, a sampler and a cube map.
    pub material: wgpu::BindGroupLayout,
    /// Per-frame constants and the per-light pass uniform (dynamic offset).
    pub shadow_frame: wgpu::BindGroupLayout,
    pub post_texture: wgpu::BindGroupLayout,
    pub post_uniform: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertex_fragment = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[
                uniform_entry(0, vertex_fragment, size_of::<PerFrameConstants>(), false),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                sampler_entry(2, wgpu::SamplerBindingType::Comparison),
            ],
        });
        let model = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("model_bind_group_layout"),
            entries: &[uniform_entry(0, vertex_fragment, size_of::<PerModelConstants>(), false)],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                sampler_entry(1, wgpu::SamplerBindingType::Filtering),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                texture_entry(3, wgpu::TextureViewDimension::Cube),
            ],
        });
        let shadow_frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_frame_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX, size_of::<PerFrameConstants>(), false),
                uniform_entry(1, wgpu::ShaderStages::VERTEX, size_of::<ShadowPassConstants>(), true),
            ],
        });
        let post_texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_texture_bind_group_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                sampler_entry(1, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let post_uniform = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_uniform_bind_group_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::FRAGMENT,
                size_of::<PostProcessingConstants>(),
                false,
            )],
        });
        Self {
            frame,
            model,
            material,
            shadow_frame,
            post_texture,
            post_uniform,
        }
    }
}

/// One row of the state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub vertex: VertexShader,
    pub pixel: PixelShader,
    pub blend: BlendType,
    pub depth: DepthType,
    pub cull: CullType,
}

impl PipelineKey {
    pub fn label(&self) -> String {
        format!(
            "{}/{} {:?} {:?} {:?}",
            self.vertex.stem(),
            self.pixel.stem(),
            self.blend,
            self.depth,
            self.cull
        )
    }
}

/// Front faces are clockwise seen from outside, as in a left-handed world.
pub(crate) const FRONT_FACE: wgpu::FrontFace = wgpu::FrontFace::Cw;

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    color_target: Option<wgpu::ColorTargetState>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    cull_mode: Option<wgpu::Face>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
) -> wgpu::RenderPipeline {
    let targets = [color_target];
    let targets: &[Option<wgpu::ColorTargetState>] = if targets[0].is_some() { &targets } else { &[] };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("fs_main"),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FRONT_FACE,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

/// Scene pipelines keyed by [`PipelineKey`], built on demand.
#[derive(Debug)]
pub struct PipelineCache {
    color_format: wgpu::TextureFormat,
    layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device, layouts: &Layouts, color_format: wgpu::TextureFormat) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.model, &layouts.material],
            immediate_size: 0,
        });
        Self {
            color_format,
            layout,
            pipelines: HashMap::new(),
        }
    }

    /// Build the pipeline for `key` unless it already exists.
    pub fn prepare(&mut self, device: &wgpu::Device, shaders: &ShaderLibrary, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let label = key.label();
        log::debug!("building pipeline {label}");
        let pipeline = mk_render_pipeline(
            device,
            &label,
            &self.layout,
            shaders.vertex(key.vertex),
            shaders.pixel(key.pixel),
            Some(wgpu::ColorTargetState {
                format: self.color_format,
                blend: key.blend.blend_state(),
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(key.depth.depth_stencil()),
            key.cull.face(),
            &[ModelVertex::desc()],
        );
        self.pipelines.insert(key, pipeline);
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::material::Material;

    #[test]
    fn presets_map_to_distinct_rows() {
        let keys: HashSet<PipelineKey> = [
            Material::default(),
            Material::additive(),
            Material::multiplicative(),
            Material::alpha(),
            Material::skinned(),
            Material::outline(),
            Material::cell_shading(),
            Material::normal_mapping(),
            Material::parallax_mapping(),
            Material::cube_map(),
            Material::tinted(),
            Material::wiggle(),
            Material::texture_fade(),
        ]
        .iter()
        .map(Material::pipeline_key)
        .collect();
        assert_eq!(keys.len(), 13);
        // the light model preset shares the additive row
        assert!(keys.contains(&Material::light_model().pipeline_key()));
    }

    #[test]
    fn label_names_shaders_and_state() {
        let label = Material::outline().pipeline_key().label();
        assert_eq!(label, "cell_shading_outline/cell_shading_outline NoBlend UseDepth Front");
    }
}
