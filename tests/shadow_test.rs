#![cfg(feature = "integration-tests")]

mod common;

use std::{f32::consts::FRAC_PI_2, sync::Arc};

use forward_ngin::{
    cgmath::{Deg, Vector3},
    config::RenderSettings,
    context::Context,
    data_structures::{
        mesh::Mesh,
        texture::{Texture, TextureSet},
    },
    light::{Light, LightKind},
    material::Material,
    scene::{LightHandle, Scene},
};

/// Ground x ≈ 1.9: hidden from the spotlight by the block, visible to the camera.
const SHADOWED: (u32, u32) = (35, 32);
/// Ground x ≈ 8.4: inside the cone, nothing in the way.
const LIT: (u32, u32) = (47, 32);

fn white_set(ctx: &Context) -> Arc<TextureSet> {
    Arc::new(TextureSet::single(
        "white",
        Texture::create_solid(&ctx.device, &ctx.queue, [255, 255, 255, 255], "white"),
    ))
}

/// A ground plane, a block hanging between it and a spotlight straight
/// above, and a camera further up looking down.
async fn block_over_ground(casts_shadows: bool) -> anyhow::Result<(Context, Scene, LightHandle)> {
    let settings = RenderSettings::default()
        .with_background_colour(wgpu::Color::BLACK)
        .with_ambient_colour(Vector3::new(0.0, 0.0, 0.0))
        .with_shadow_map_size(256);
    let (ctx, mut scene) = common::headless_scene(settings).await?;
    scene.camera_mut().set_position(Vector3::new(0.0, 30.0, 0.0));
    scene.camera_mut().set_rotation(Vector3::new(FRAC_PI_2, 0.0, 0.0));

    let ground = Arc::new(Mesh::plane(&ctx.device, 40.0)?);
    scene.add_model(&ctx.device, "ground", ground, white_set(&ctx), Material::default());
    let block = Arc::new(Mesh::cube(&ctx.device, 2.0)?);
    let handle = scene.add_model(&ctx.device, "block", block, white_set(&ctx), Material::default());
    if let Some(block) = scene.model_mut(handle) {
        block.set_position(Vector3::new(0.0, 7.0, 0.0));
    }

    let mut light = Light::new();
    light.set_kind(LightKind::Spot);
    light.set_casts_shadows(casts_shadows);
    light.set_cone_angle(Deg(90.0));
    light.set_colour(Vector3::new(20.0, 20.0, 20.0));
    light.set_strength(1.0);
    light.set_position(Vector3::new(0.0, 10.0, 0.0));
    light.face_target(Vector3::new(0.0, 0.0, 0.0));
    let handle = scene.add_light(&ctx.device, light)?;
    Ok((ctx, scene, handle))
}

#[tokio::test]
async fn caster_darkens_the_ground_behind_it() {
    let (ctx, mut scene, _) = block_over_ground(true).await.unwrap();
    let image = common::render_frame(&ctx, &mut scene).await.unwrap();

    let lit = image.get_pixel(LIT.0, LIT.1);
    let shadowed = image.get_pixel(SHADOWED.0, SHADOWED.1);
    assert!(lit[0] > 200, "{lit:?}");
    assert!(shadowed[0] < 40, "{shadowed:?}");
}

#[tokio::test]
async fn light_without_shadows_reaches_past_the_caster() {
    let (ctx, mut scene, _) = block_over_ground(false).await.unwrap();
    let image = common::render_frame(&ctx, &mut scene).await.unwrap();

    let lit = image.get_pixel(LIT.0, LIT.1);
    let behind_block = image.get_pixel(SHADOWED.0, SHADOWED.1);
    assert!(lit[0] > 200, "{lit:?}");
    assert!(behind_block[0] > 200, "{behind_block:?}");
}

#[tokio::test]
async fn shadow_survives_a_strength_round_trip() {
    let (ctx, mut scene, handle) = block_over_ground(true).await.unwrap();
    let light = scene.light_mut(handle).unwrap();
    light.set_strength(0.0);
    light.set_strength(1.0);

    let image = common::render_frame(&ctx, &mut scene).await.unwrap();
    let shadowed = image.get_pixel(SHADOWED.0, SHADOWED.1);
    assert!(shadowed[0] < 40, "{shadowed:?}");
}
