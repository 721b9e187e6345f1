//! The scene: everything drawn in a frame and the passes that draw it.
//!
//! A frame runs in three steps. [`Scene::update`] advances the camera, the
//! light effects and the post-processing animation. [`Scene::render`] then
//! uploads the per-frame constants once, renders a depth-only pass into one
//! shadow map layer per shadow-casting light, and finally draws the scene from
//! the camera (opaque models, blended models back to front, light models),
//! optionally through a full-screen post-processing effect.

use std::sync::Arc;

use cgmath::{Vector3, Zero};
use rand::{SeedableRng, rngs::StdRng};
use winit::keyboard::KeyCode;

use crate::{
    camera::Camera,
    config::RenderSettings,
    context::{Context, InitContext},
    data_structures::{
        mesh::Mesh,
        texture::{DefaultTextures, Texture, TextureSet},
    },
    error::RenderError,
    input::Keyboard,
    light::{Light, LightEffect},
    material::Material,
    pipelines::{
        Layouts, PipelineCache, PipelineKey,
        post::{PostProcessor, animate},
        shader::ShaderLibrary,
        shadow::ShadowMaps,
        state::Samplers,
    },
    render::{DrawItem, DrawModel, draw_order},
    scene_model::SceneModel,
    uniforms::{MAX_LIGHTS, PerFrameConstants},
};

/// Radius of the default light model before it is scaled by strength.
const LIGHT_MODEL_RADIUS: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle(usize);

impl ModelHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightHandle(usize);

impl LightHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Clocks that feed the per-frame constants.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    /// Length of the last frame in seconds.
    pub frame_time: f32,
    /// Seconds since the scene was created.
    pub elapsed: f32,
    /// Phase of the wiggle vertex animation.
    pub wiggle: f32,
}

/// Per-frame constants for one view of the scene.
///
/// Also returns the shadow casters: entry `n` is the index of the light that
/// renders into shadow map layer `n`.
pub fn frame_constants(
    camera: &Camera,
    lights: &[Light],
    settings: &RenderSettings,
    timing: FrameTiming,
    viewport: [u32; 2],
) -> (PerFrameConstants, Vec<usize>) {
    let mut constants = PerFrameConstants {
        camera: camera.world().into(),
        view: camera.view().into(),
        projection: camera.projection().into(),
        view_projection: camera.view_projection().into(),
        ambient_colour: settings.ambient_colour.into(),
        specular_power: settings.specular_power,
        camera_position: camera.position().into(),
        frame_time: timing.frame_time,
        outline_colour: settings.outline_colour.into(),
        outline_thickness: settings.outline_thickness,
        viewport_size: [viewport[0] as f32, viewport[1] as f32],
        wiggle: timing.wiggle,
        parallax_depth: settings.parallax_depth,
        elapsed_time: timing.elapsed,
        ..Default::default()
    };

    let mut casters = Vec::new();
    for (index, (slot, light)) in constants.lights.iter_mut().zip(lights).enumerate() {
        let layer = if light.casts_shadows() {
            casters.push(index);
            Some(casters.len() - 1)
        } else {
            None
        };
        *slot = light.constants(layer);
    }
    constants.light_count = lights.len().min(MAX_LIGHTS) as u32;
    (constants, casters)
}

fn frame_bind_group(
    device: &wgpu::Device,
    layouts: &Layouts,
    frame_buffer: &wgpu::Buffer,
    shadows: &ShadowMaps,
    samplers: &Samplers,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("frame bind group"),
        layout: &layouts.frame,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(shadows.view()),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&samplers.shadow),
            },
        ],
    })
}

#[derive(Debug)]
pub struct Scene {
    settings: RenderSettings,
    layouts: Layouts,
    samplers: Samplers,
    defaults: DefaultTextures,
    shaders: ShaderLibrary,
    pipelines: PipelineCache,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    shadows: ShadowMaps,
    post: PostProcessor,
    rng: StdRng,

    models: Vec<SceneModel>,
    lights: Vec<Light>,
    /// `light_models[i]` draws `lights[i]`.
    light_models: Vec<SceneModel>,
    light_mesh: Arc<Mesh>,
    light_textures: Arc<TextureSet>,

    camera: Camera,
    orbit_target: Option<ModelHandle>,
    timing: FrameTiming,
    viewport: [u32; 2],
}

impl Scene {
    pub fn new(ctx: &InitContext, settings: RenderSettings) -> anyhow::Result<Self> {
        let device = &ctx.device;
        let viewport = [ctx.config.width, ctx.config.height];

        let layouts = Layouts::new(device);
        let samplers = Samplers::new(device);
        let defaults = DefaultTextures::new(device, &ctx.queue);
        let shaders = ShaderLibrary::load(device)?;
        let pipelines = PipelineCache::new(device, &layouts, ctx.config.format);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame constants"),
            size: size_of::<PerFrameConstants>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadows = ShadowMaps::new(device, &layouts, &shaders, &frame_buffer, settings.shadow_map_size);
        let frame_bind_group = frame_bind_group(device, &layouts, &frame_buffer, &shadows, &samplers);
        let post = PostProcessor::new(device, &layouts, &shaders, &samplers.post, ctx.config.format, viewport);

        let light_mesh = Arc::new(Mesh::sphere(device, LIGHT_MODEL_RADIUS, 16)?);
        let light_textures = Arc::new(TextureSet::single(
            "light",
            Texture::create_solid(device, &ctx.queue, [255, 255, 255, 255], "light model texture"),
        ));

        let seed = settings.seed();
        log::info!("scene created, {}x{} viewport, random seed {seed}", viewport[0], viewport[1]);
        let mut camera = Camera::default();
        camera.set_aspect(viewport[0], viewport[1]);
        Ok(Self {
            settings,
            layouts,
            samplers,
            defaults,
            shaders,
            pipelines,
            frame_buffer,
            frame_bind_group,
            shadows,
            post,
            rng: StdRng::seed_from_u64(seed),
            models: Vec::new(),
            lights: Vec::new(),
            light_models: Vec::new(),
            light_mesh,
            light_textures,
            camera,
            orbit_target: None,
            timing: FrameTiming::default(),
            viewport,
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    pub fn add_model(
        &mut self,
        device: &wgpu::Device,
        name: impl Into<String>,
        mesh: Arc<Mesh>,
        textures: Arc<TextureSet>,
        material: Material,
    ) -> ModelHandle {
        let model = SceneModel::new(device, &self.layouts, name, mesh, textures, material);
        log::debug!("added model `{}` ({:?})", model.name(), model.material().pipeline_key().label());
        self.models.push(model);
        ModelHandle(self.models.len() - 1)
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&SceneModel> {
        self.models.get(handle.0)
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut SceneModel> {
        self.models.get_mut(handle.0)
    }

    pub fn models(&self) -> &[SceneModel] {
        &self.models
    }

    /// Fails once the scene already holds [`MAX_LIGHTS`] lights.
    pub fn add_light(&mut self, device: &wgpu::Device, light: Light) -> Result<LightHandle, RenderError> {
        if self.lights.len() >= MAX_LIGHTS {
            return Err(RenderError::TooManyLights {
                max: MAX_LIGHTS,
                got: self.lights.len() + 1,
            });
        }
        let index = self.lights.len();
        let model = self.light_model(device, index);
        self.lights.push(light);
        self.light_models.push(model);
        Ok(LightHandle(index))
    }

    fn light_model(&self, device: &wgpu::Device, index: usize) -> SceneModel {
        let mut model = SceneModel::new(
            device,
            &self.layouts,
            format!("light {index}"),
            self.light_mesh.clone(),
            self.light_textures.clone(),
            Material::light_model(),
        );
        model.set_casts_shadows(false);
        model
    }

    pub fn light(&self, handle: LightHandle) -> Option<&Light> {
        self.lights.get(handle.0)
    }

    pub fn light_mut(&mut self, handle: LightHandle) -> Option<&mut Light> {
        self.lights.get_mut(handle.0)
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Use `mesh` and `textures` to draw every light, present and future.
    pub fn set_light_appearance(&mut self, device: &wgpu::Device, mesh: Arc<Mesh>, textures: Arc<TextureSet>) {
        self.light_mesh = mesh;
        self.light_textures = textures;
        self.light_models = (0..self.lights.len()).map(|i| self.light_model(device, i)).collect();
    }

    /// Orbiting lights circle this model. Without one they circle the origin.
    pub fn set_orbit_target(&mut self, target: Option<ModelHandle>) {
        self.orbit_target = target;
    }

    /// The target's root node has no parent, so its local translation is
    /// already its world position, even before the next upload.
    fn orbit_centre(&self) -> Vector3<f32> {
        self.orbit_target
            .and_then(|handle| self.model(handle))
            .map_or_else(Vector3::zero, SceneModel::position)
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.viewport = [width, height];
        self.camera.set_aspect(width, height);
        self.post.resize(device, &self.layouts, &self.samplers.post, self.viewport);
    }

    /// Advance the camera, light effects and animation clocks by `dt` seconds.
    pub fn update(&mut self, keyboard: &Keyboard, dt: f32) {
        self.camera.control(
            dt,
            keyboard,
            self.settings.camera_rotation_speed,
            self.settings.camera_movement_speed,
        );

        if keyboard.key_hit(KeyCode::Digit1) {
            for light in self.lights.iter_mut().filter(|l| l.effect() == LightEffect::Orbit) {
                light.toggle_orbit();
            }
        }
        let centre = self.orbit_centre();
        for light in &mut self.lights {
            light.tick(
                dt,
                centre,
                &mut self.rng,
                self.settings.light_orbit_radius,
                self.settings.light_orbit_speed,
            );
        }

        self.timing.frame_time = dt;
        self.timing.elapsed += dt;
        self.timing.wiggle += self.settings.wiggle_speed * dt;

        if self.settings.post_process.is_some() {
            animate(
                self.post.constants_mut(),
                dt,
                self.timing.elapsed,
                self.viewport,
                self.settings.tint_colour.into(),
                &mut self.rng,
            );
        }
    }

    /// Light models follow their light's transform and show its raw colour.
    fn sync_light_models(&mut self) {
        for (light, model) in self.lights.iter().zip(&mut self.light_models) {
            model.model_mut().set_local_matrix(light.model().local_matrix(0), 0);
            model.set_colour(light.colour());
        }
    }

    /// Render one frame into `output`, using the context's depth buffer.
    pub fn render(&mut self, ctx: &Context, output: &wgpu::TextureView) {
        let device = &ctx.device;
        let queue = &ctx.queue;

        let (constants, casters) =
            frame_constants(&self.camera, &self.lights, &self.settings, self.timing, self.viewport);
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[constants]));
        if self
            .shadows
            .ensure(device, self.settings.shadow_map_size, casters.len() as u32)
        {
            self.frame_bind_group = frame_bind_group(
                device,
                &self.layouts,
                &self.frame_buffer,
                &self.shadows,
                &self.samplers,
            );
        }

        self.sync_light_models();
        for model in self.models.iter_mut().chain(self.light_models.iter_mut()) {
            model.prepare(
                device,
                &self.layouts,
                &self.samplers,
                &self.defaults,
                &mut self.pipelines,
                &self.shaders,
            );
            model.write_constants(queue);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Encoder"),
        });

        self.shadows.write_pass_uniforms(queue, &casters);
        for layer in 0..casters.len() {
            self.shadows
                .render_layer(&mut encoder, layer, self.models.iter().filter(|m| m.casts_shadows()));
        }

        let effect = self.settings.post_process;
        let scene_target = if effect.is_some() {
            self.post.scene_view()
        } else {
            output
        };
        self.render_main_pass(&mut encoder, scene_target, ctx.depth_view());

        if let Some(effect) = effect {
            self.post.write_constants(queue);
            self.post.render(&mut encoder, effect, output);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    fn render_main_pass(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView, depth: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.settings.background_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
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
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        let order = draw_order(
            self.models.iter().enumerate().map(|(i, m)| DrawItem::of(i, m)),
            self.camera.position(),
        );
        let mut bound: Option<PipelineKey> = None;
        let mut draw = |pass: &mut wgpu::RenderPass<'_>, model: &SceneModel, key: PipelineKey| {
            if bound != Some(key) {
                let Some(pipeline) = self.pipelines.get(&key) else {
                    log::warn!("no pipeline for {}", key.label());
                    return;
                };
                pass.set_pipeline(pipeline);
                bound = Some(key);
            }
            pass.draw_material_model(model);
        };

        let outline = Material::outline().pipeline_key();
        for &i in &order.outlines {
            draw(&mut pass, &self.models[i], outline);
        }
        for &i in order.opaque.iter().chain(&order.blended) {
            let model = &self.models[i];
            draw(&mut pass, model, model.material().pipeline_key());
        }
        for model in &self.light_models {
            draw(&mut pass, model, model.material().pipeline_key());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        light::LightKind,
        uniforms::NO_SHADOW,
    };

    fn spot(position: Vector3<f32>) -> Light {
        let mut light = Light::new();
        light.set_kind(LightKind::Spot);
        light.set_position(position);
        light
    }

    #[test]
    fn casters_get_consecutive_layers() {
        let lights = [
            spot(Vector3::new(30.0, 10.0, 0.0)),
            Light::new(),
            spot(Vector3::new(0.0, 20.0, 0.0)),
        ];
        let (constants, casters) = frame_constants(
            &Camera::default(),
            &lights,
            &RenderSettings::default(),
            FrameTiming::default(),
            [800, 600],
        );
        assert_eq!(casters, vec![0, 2]);
        assert_eq!(constants.light_count, 3);
        assert_eq!(constants.lights[0].shadow_layer, 0);
        assert_eq!(constants.lights[1].shadow_layer, NO_SHADOW);
        assert_eq!(constants.lights[2].shadow_layer, 1);
        assert_eq!(constants.lights[0].position, [30.0, 10.0, 0.0]);
    }

    #[test]
    fn frame_constants_carry_camera_settings_and_clocks() {
        let camera = Camera::new(Vector3::new(25.0, 12.0, -10.0), Vector3::zero());
        let settings = RenderSettings::default();
        let timing = FrameTiming {
            frame_time: 0.016,
            elapsed: 3.0,
            wiggle: 18.0,
        };
        let (constants, casters) = frame_constants(&camera, &[], &settings, timing, [1280, 720]);
        assert!(casters.is_empty());
        assert_eq!(constants.light_count, 0);
        assert_eq!(constants.camera_position, [25.0, 12.0, -10.0]);
        assert_eq!(constants.viewport_size, [1280.0, 720.0]);
        assert_eq!(constants.specular_power, settings.specular_power);
        assert_eq!(constants.parallax_depth, settings.parallax_depth);
        assert_eq!(constants.outline_thickness, settings.outline_thickness);
        assert_eq!(constants.elapsed_time, 3.0);
        assert_eq!(constants.wiggle, 18.0);
        let view: [[f32; 4]; 4] = camera.view().into();
        assert_eq!(constants.view, view);
    }

    #[test]
    fn light_colour_is_scaled_by_strength() {
        let mut light = Light::new();
        light.set_colour(Vector3::new(1.0, 0.5, 0.0));
        light.set_strength(10.0);
        let (constants, _) = frame_constants(
            &Camera::default(),
            &[light],
            &RenderSettings::default(),
            FrameTiming::default(),
            [1, 1],
        );
        assert_eq!(constants.lights[0].colour, [10.0, 5.0, 0.0]);
    }
}
