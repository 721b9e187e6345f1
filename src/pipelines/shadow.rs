//! Depth-only rendering from each shadow-casting light.
//!
//! All shadow maps share one `Depth32Float` texture array, one layer per
//! casting light. The depth pass reads the light's matrices straight out of the
//! per-frame constants; a small uniform bound with a dynamic offset tells it
//! which light it is rendering for.

use crate::{
    data_structures::{
        mesh::{ModelVertex, Vertex},
        texture::Texture,
    },
    pipelines::{
        Layouts, mk_render_pipeline,
        shader::{PixelShader, ShaderLibrary, VertexShader},
        state::{CullType, DepthType},
    },
    render::DrawModel,
    scene_model::SceneModel,
    uniforms::{MAX_LIGHTS, ShadowPassConstants},
};

fn aligned_stride(device: &wgpu::Device) -> u32 {
    let alignment = device.limits().min_uniform_buffer_offset_alignment;
    let size = size_of::<ShadowPassConstants>() as u32;
    size.div_ceil(alignment) * alignment
}

#[derive(Debug)]
pub struct ShadowMaps {
    size: u32,
    layers: u32,
    texture: Texture,
    layer_views: Vec<wgpu::TextureView>,
    pass_buffer: wgpu::Buffer,
    stride: u32,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
}

impl ShadowMaps {
    pub fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        shaders: &ShaderLibrary,
        frame_buffer: &wgpu::Buffer,
        size: u32,
    ) -> Self {
        let stride = aligned_stride(device);
        let pass_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow pass buffer"),
            size: (stride as usize * MAX_LIGHTS) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow frame bind group"),
            layout: &layouts.shadow_frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &pass_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(size_of::<ShadowPassConstants>() as u64),
                    }),
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&layouts.shadow_frame, &layouts.model],
            immediate_size: 0,
        });
        let pipeline = mk_render_pipeline(
            device,
            "shadow depth pipeline",
            &layout,
            shaders.vertex(VertexShader::ShadowDepth),
            shaders.pixel(PixelShader::DepthOnly),
            None,
            Some(DepthType::UseDepth.depth_stencil()),
            CullType::Front.face(),
            &[ModelVertex::desc()],
        );

        let (texture, layer_views) = Texture::create_shadow_array(device, size, 1);
        Self {
            size,
            layers: 1,
            texture,
            layer_views,
            pass_buffer,
            stride,
            bind_group,
            pipeline,
        }
    }

    /// Make sure there is a `size²` layer for each of `layers` lights.
    ///
    /// Returns `true` if the array was recreated, which invalidates bind
    /// groups holding [`view`](Self::view).
    pub fn ensure(&mut self, device: &wgpu::Device, size: u32, layers: u32) -> bool {
        let layers = layers.clamp(1, MAX_LIGHTS as u32);
        if size == self.size && layers <= self.layers {
            return false;
        }
        log::info!("shadow maps: {layers} layers of {size}x{size}");
        let (texture, layer_views) = Texture::create_shadow_array(device, size, layers);
        self.texture = texture;
        self.layer_views = layer_views;
        self.size = size;
        self.layers = layers;
        true
    }

    /// View over every layer, for sampling in the main pass.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.texture.view
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Record which light each layer renders. `lights[layer]` is a light index.
    pub fn write_pass_uniforms(&self, queue: &wgpu::Queue, lights: &[usize]) {
        for (layer, &light) in lights.iter().enumerate().take(MAX_LIGHTS) {
            let constants = ShadowPassConstants {
                light_index: light as u32,
                ..Default::default()
            };
            queue.write_buffer(
                &self.pass_buffer,
                layer as wgpu::BufferAddress * self.stride as wgpu::BufferAddress,
                bytemuck::cast_slice(&[constants]),
            );
        }
    }

    /// Clear `layer` to the far plane and draw every caster into it.
    pub fn render_layer<'m>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        layer: usize,
        casters: impl IntoIterator<Item = &'m SceneModel>,
    ) {
        let Some(view) = self.layer_views.get(layer) else {
            log::warn!("no shadow map layer {layer}");
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Depth Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[layer as u32 * self.stride]);
        for model in casters {
            pass.draw_scene_model(model);
        }
    }
}
