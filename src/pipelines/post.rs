//! Full-screen post-processing.
//!
//! When an effect is active the scene is rendered into an off-screen colour
//! target, then a single triangle covering the viewport copies it to the real
//! output through the effect's pixel shader.

use std::collections::HashMap;

use rand::{RngExt, rngs::StdRng};

use crate::{
    data_structures::texture::Texture,
    pipelines::{
        Layouts, mk_render_pipeline,
        shader::{ShaderLibrary, VertexShader},
    },
    uniforms::PostProcessingConstants,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostProcess {
    Tint,
    GreyNoise,
    Burn,
    Distort,
    Spiral,
}

impl PostProcess {
    pub const ALL: &'static [PostProcess] = &[
        PostProcess::Tint,
        PostProcess::GreyNoise,
        PostProcess::Burn,
        PostProcess::Distort,
        PostProcess::Spiral,
    ];

    pub fn stem(self) -> &'static str {
        match self {
            PostProcess::Tint => "tint",
            PostProcess::GreyNoise => "grey_noise",
            PostProcess::Burn => "burn",
            PostProcess::Distort => "distort",
            PostProcess::Spiral => "spiral",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}_pp.wgsl", self.stem())
    }

    /// The effect after this one, wrapping around. Handy for cycling on a key.
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&e| e == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

/// Texels per noise cell in the grey-noise effect.
const NOISE_CELL: f32 = 64.0;
const BURN_SPEED: f32 = 0.2;

/// Advance the animated post-processing parameters by one frame.
pub fn animate(
    constants: &mut PostProcessingConstants,
    dt: f32,
    elapsed: f32,
    viewport: [u32; 2],
    tint: [f32; 3],
    rng: &mut StdRng,
) {
    constants.tint_colour = tint;
    constants.elapsed_time = elapsed;
    constants.noise_scale = [viewport[0] as f32 / NOISE_CELL, viewport[1] as f32 / NOISE_CELL];
    constants.noise_offset = [rng.random_range(0.0..1.0f32), rng.random_range(0.0..1.0f32)];

    constants.burn_height += BURN_SPEED * dt;
    if constants.burn_height > 1.0 {
        constants.burn_height = 0.0;
    }
    constants.distort_level = 0.03 + 0.02 * elapsed.sin();
    constants.spiral_level = (1.0 - elapsed.cos()) * 4.0;
}

#[derive(Debug)]
pub struct PostProcessor {
    format: wgpu::TextureFormat,
    target: Texture,
    texture_bind_group: wgpu::BindGroup,
    constants: PostProcessingConstants,
    buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    pipelines: HashMap<PostProcess, wgpu::RenderPipeline>,
}

impl PostProcessor {
    pub fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        shaders: &ShaderLibrary,
        sampler: &wgpu::Sampler,
        format: wgpu::TextureFormat,
        size: [u32; 2],
    ) -> Self {
        let target = Texture::create_render_target(device, size, format, "post-process scene texture");
        let texture_bind_group = Self::texture_bind_group(device, layouts, &target, sampler);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("post-process constants"),
            size: size_of::<PostProcessingConstants>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("post-process uniform bind group"),
            layout: &layouts.post_uniform,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post-process Pipeline Layout"),
            bind_group_layouts: &[&layouts.post_texture, &layouts.post_uniform],
            immediate_size: 0,
        });
        let pipelines = PostProcess::ALL
            .iter()
            .map(|&effect| {
                let pipeline = mk_render_pipeline(
                    device,
                    &format!("{} post-process pipeline", effect.stem()),
                    &layout,
                    shaders.vertex(VertexShader::FullScreenQuad),
                    shaders.post(effect),
                    Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                    None,
                    None,
                    &[],
                );
                (effect, pipeline)
            })
            .collect();

        Self {
            format,
            target,
            texture_bind_group,
            constants: PostProcessingConstants::default(),
            buffer,
            uniform_bind_group,
            pipelines,
        }
    }

    fn texture_bind_group(
        device: &wgpu::Device,
        layouts: &Layouts,
        target: &Texture,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("post-process texture bind group"),
            layout: &layouts.post_texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&target.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        layouts: &Layouts,
        sampler: &wgpu::Sampler,
        size: [u32; 2],
    ) {
        self.target = Texture::create_render_target(device, size, self.format, "post-process scene texture");
        self.texture_bind_group = Self::texture_bind_group(device, layouts, &self.target, sampler);
    }

    /// Where the scene is drawn while an effect is active.
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.target.view
    }

    pub fn constants(&self) -> &PostProcessingConstants {
        &self.constants
    }

    pub fn constants_mut(&mut self) -> &mut PostProcessingConstants {
        &mut self.constants
    }

    pub fn write_constants(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.constants]));
    }

    /// Draw the scene texture to `output` through `effect`.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, effect: PostProcess, output: &wgpu::TextureView) {
        let Some(pipeline) = self.pipelines.get(&effect) else {
            log::warn!("no pipeline for post-process {effect:?}");
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Post-process Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.texture_bind_group, &[]);
        pass.set_bind_group(1, &self.uniform_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn burn_height_wraps() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut constants = PostProcessingConstants {
            burn_height: 0.95,
            ..Default::default()
        };
        animate(&mut constants, 0.1, 0.0, [1280, 720], [1.0; 3], &mut rng);
        assert!((constants.burn_height - 0.97).abs() < 1e-5);
        animate(&mut constants, 0.5, 0.0, [1280, 720], [1.0; 3], &mut rng);
        assert_eq!(constants.burn_height, 0.0);
    }

    #[test]
    fn noise_follows_viewport_and_seed() {
        let mut a = PostProcessingConstants::default();
        let mut b = PostProcessingConstants::default();
        animate(&mut a, 0.016, 1.0, [1280, 720], [1.0, 0.6, 0.6], &mut StdRng::seed_from_u64(3));
        animate(&mut b, 0.016, 1.0, [1280, 720], [1.0, 0.6, 0.6], &mut StdRng::seed_from_u64(3));
        assert_eq!(a.noise_scale, [20.0, 11.25]);
        assert_eq!(a.noise_offset, b.noise_offset);
        assert!(a.noise_offset.iter().all(|v| (0.0..1.0).contains(v)));
        assert_eq!(a.tint_colour, [1.0, 0.6, 0.6]);
    }

    #[test]
    fn spiral_and_distort_animate_with_time() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut constants = PostProcessingConstants::default();
        animate(&mut constants, 0.0, 0.0, [64, 64], [1.0; 3], &mut rng);
        assert_eq!(constants.spiral_level, 0.0);
        assert!((constants.distort_level - 0.03).abs() < 1e-6);
        animate(&mut constants, 0.0, std::f32::consts::PI, [64, 64], [1.0; 3], &mut rng);
        assert!((constants.spiral_level - 8.0).abs() < 1e-4);
    }

    #[test]
    fn effects_cycle() {
        assert_eq!(PostProcess::Tint.next(), PostProcess::GreyNoise);
        assert_eq!(PostProcess::Spiral.next(), PostProcess::Tint);
        assert_eq!(PostProcess::Burn.file_name(), "burn_pp.wgsl");
    }
}
