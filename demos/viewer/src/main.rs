use std::sync::Arc;

use forward_ngin::{
    KeyCode,
    cgmath::{Deg, Rad, Vector3},
    config::RenderSettings,
    context::{Context, InitContext},
    data_structures::{
        mesh::Mesh,
        model::PoseControls,
        texture::{Texture, TextureSet},
    },
    flow::{self, SceneFlow},
    input::Keyboard,
    light::{Light, LightEffect, LightKind},
    material::Material,
    pipelines::post::PostProcess,
    resources::{load_mesh, load_texture_set},
    scene::{ModelHandle, Scene},
};

/// Load a texture set, or fall back to a single solid colour if the files
/// are not in `assets/`.
async fn textures_or(ctx: &InitContext, names: &[&str], fallback: [u8; 4]) -> Arc<TextureSet> {
    match load_texture_set(&ctx.device, &ctx.queue, names).await {
        Ok(set) => Arc::new(set),
        Err(e) => {
            log::warn!("using a solid colour for {names:?}: {e:#}");
            Arc::new(TextureSet::single(
                names.first().copied().unwrap_or("solid"),
                Texture::create_solid(&ctx.device, &ctx.queue, fallback, "fallback"),
            ))
        }
    }
}

async fn mesh_or(ctx: &InitContext, name: &str, fallback: impl FnOnce() -> anyhow::Result<Mesh>) -> anyhow::Result<Arc<Mesh>> {
    match load_mesh(&ctx.device, name).await {
        Ok(mesh) => Ok(Arc::new(mesh)),
        Err(e) => {
            log::warn!("using a stand-in for `{name}`: {e:#}");
            Ok(Arc::new(fallback()?))
        }
    }
}

fn degrees(x: f32, y: f32, z: f32) -> Vector3<f32> {
    Vector3::new(Rad::from(Deg(x)).0, Rad::from(Deg(y)).0, Rad::from(Deg(z)).0)
}

struct Viewer {
    scene: Scene,
    character: ModelHandle,
}

impl Viewer {
    async fn new(ctx: InitContext) -> anyhow::Result<Self> {
        let device = &ctx.device;
        let mut scene = Scene::new(&ctx, RenderSettings::default())?;

        let man = mesh_or(&ctx, "Man.glb", || Ok(Mesh::cube(device, 200.0)?)).await?;
        let hills = mesh_or(&ctx, "Hills.obj", || Ok(Mesh::plane(device, 2000.0)?)).await?;
        let container = mesh_or(&ctx, "CargoContainer.obj", || Ok(Mesh::cube(device, 4.0)?)).await?;
        let floor = mesh_or(&ctx, "Floor.obj", || Ok(Mesh::plane(device, 200.0)?)).await?;
        let teapot = mesh_or(&ctx, "Teapot.obj", || Ok(Mesh::sphere(device, 8.0, 24)?)).await?;
        let sphere = Arc::new(Mesh::sphere(device, 10.0, 32)?);
        let cube = Arc::new(Mesh::cube(device, 10.0)?);

        let character = scene.add_model(
            device,
            "Character",
            man,
            textures_or(&ctx, &["ManDiffuseSpecular.png"], [200, 170, 150, 64]).await,
            Material::skinned(),
        );
        if let Some(model) = scene.model_mut(character) {
            model.set_scale(0.06);
            model.set_position(Vector3::new(45.0, 16.0, 45.0));
            model.set_rotation(degrees(0.0, 220.0, 90.0));
        }

        let grass = textures_or(&ctx, &["GrassDiffuseSpecular.png"], [70, 120, 50, 32]).await;
        scene.add_model(device, "Ground", hills, grass, Material::default());

        let cargo = textures_or(&ctx, &["CargoA.png"], [160, 80, 40, 64]).await;
        let crate_handle = scene.add_model(device, "Crate", container, cargo, Material::default());
        if let Some(model) = scene.model_mut(crate_handle) {
            model.set_position(Vector3::new(45.0, 0.0, 45.0));
            model.set_scale(6.0);
            model.set_rotation(degrees(0.0, -50.0, 0.0));
        }

        let wood = textures_or(&ctx, &["Wood2.jpg"], [150, 110, 70, 255]).await;
        let floor_handle = scene.add_model(device, "Floor", floor, wood, Material::default());
        let tech = textures_or(&ctx, &["tech02.jpg"], [120, 130, 140, 255]).await;
        let teapot_handle = scene.add_model(device, "Teapot", teapot, tech.clone(), Material::default());
        let sphere_handle = scene.add_model(device, "Sphere", sphere, tech, Material::wiggle());
        for (handle, position) in [
            (floor_handle, Vector3::new(-300.0, 0.0, 0.0)),
            (teapot_handle, Vector3::new(-340.0, 0.0, 0.0)),
            (sphere_handle, Vector3::new(-300.0, 10.0, 30.0)),
        ] {
            if let Some(model) = scene.model_mut(handle) {
                model.set_position(position);
            }
        }
        if let Some(model) = scene.model_mut(sphere_handle) {
            model.set_scale(0.5);
        }

        let cubes = [
            ("Cube", vec!["Wood2.jpg", "tech02.jpg"], [150, 110, 70, 255], Material::texture_fade()),
            ("Additive Cube", vec!["Flare.jpg"], [255, 200, 120, 255], Material::additive()),
            ("Multiplicative Cube", vec!["Glass.jpg"], [180, 220, 255, 255], Material::multiplicative()),
            ("Alpha Cube", vec!["Smoke.png"], [200, 200, 200, 128], Material::alpha()),
            ("Moogle Cube", vec!["Moogle.png"], [255, 255, 255, 160], Material::alpha()),
        ];
        for (i, (name, files, fallback, material)) in cubes.into_iter().enumerate() {
            let textures = textures_or(&ctx, &files, fallback).await;
            let handle = scene.add_model(device, name, cube.clone(), textures, material);
            if let Some(model) = scene.model_mut(handle) {
                model.set_position(Vector3::new(-320.0, 10.0, 60.0 + 20.0 * i as f32));
            }
        }

        let lights = [
            (Vector3::new(0.8, 0.8, 1.0), 10.0, Vector3::new(30.0, 10.0, 0.0), LightKind::Spot, LightEffect::Orbit),
            (Vector3::new(1.0, 0.8, 0.2), 60.0, Vector3::new(-10.0, 25.0, -30.0), LightKind::Point, LightEffect::None),
            (Vector3::new(1.0, 0.0, 0.0), 50.0, Vector3::new(-310.0, 10.0, 0.0), LightKind::Point, LightEffect::Pulsate),
            (Vector3::new(0.2, 0.5, 8.0), 40.0, Vector3::new(-310.0, 25.0, 30.0), LightKind::Point, LightEffect::ColourCycle),
            (Vector3::new(0.75, 0.75, 0.75), 40.0, Vector3::new(-20.0, 40.0, -50.0), LightKind::Directional, LightEffect::None),
        ];
        for (colour, strength, position, kind, effect) in lights {
            let mut light = Light::new();
            light.set_colour(colour);
            light.set_strength(strength);
            light.set_position(position);
            light.set_kind(kind);
            light.set_effect(effect);
            scene.add_light(device, light)?;
        }
        let flare = textures_or(&ctx, &["Flare.jpg"], [255, 255, 255, 255]).await;
        let light_mesh = Arc::new(Mesh::sphere(device, 0.25, 16)?);
        scene.set_light_appearance(device, light_mesh, flare);
        scene.set_orbit_target(Some(character));

        scene.camera_mut().set_position(Vector3::new(25.0, 12.0, -10.0));
        scene.camera_mut().set_rotation(degrees(13.0, 15.0, 0.0));

        Ok(Self { scene, character })
    }
}

/// (node, keys) pairs posing the character.
fn pose_controls() -> [(usize, PoseControls); 6] {
    let forward = |key| PoseControls {
        move_forward: Some(key),
        ..Default::default()
    };
    [
        (
            20,
            PoseControls {
                turn_cw: Some(KeyCode::KeyU),
                turn_ccw: Some(KeyCode::KeyO),
                move_forward: Some(KeyCode::KeyI),
                ..Default::default()
            },
        ),
        (33, forward(KeyCode::KeyI)),
        (37, forward(KeyCode::KeyT)),
        (41, forward(KeyCode::KeyT)),
        (6, forward(KeyCode::KeyZ)),
        (20, forward(KeyCode::KeyZ)),
    ]
}

impl SceneFlow for Viewer {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn on_update(&mut self, _ctx: &Context, keyboard: &Keyboard, dt: std::time::Duration) {
        let settings = self.scene.settings().clone();
        if keyboard.key_hit(KeyCode::KeyK) {
            let next = match settings.post_process {
                None => Some(PostProcess::Tint),
                Some(PostProcess::Spiral) => None,
                Some(effect) => Some(effect.next()),
            };
            log::info!("post-process {next:?}");
            self.scene.settings_mut().post_process = next;
        }

        let Some(character) = self.scene.model_mut(self.character) else {
            return;
        };
        let model = character.model_mut();
        for (node, controls) in pose_controls() {
            if node < model.node_count() {
                model.control(
                    node,
                    dt.as_secs_f32(),
                    keyboard,
                    &controls,
                    settings.camera_rotation_speed,
                    settings.camera_movement_speed,
                );
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    flow::run("Forward Renderer", flow::constructor(Viewer::new))
}
