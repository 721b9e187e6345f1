#![cfg(feature = "integration-tests")]

mod common;

use forward_ngin::{config::RenderSettings, pipelines::post::PostProcess};

#[tokio::test]
async fn empty_scene_shows_background() {
    let settings = RenderSettings::default().with_background_colour(wgpu::Color::WHITE);
    let (ctx, mut scene) = common::headless_scene(settings).await.unwrap();
    let image = common::render_frame(&ctx, &mut scene).await.unwrap();

    assert_eq!(image.dimensions(), (common::WIDTH, common::HEIGHT));
    for pixel in image.pixels() {
        assert_eq!(*pixel, image::Rgba([255, 255, 255, 255]));
    }
}

#[tokio::test]
async fn tint_effect_colours_the_whole_frame() {
    let settings = RenderSettings::default()
        .with_background_colour(wgpu::Color::WHITE)
        .with_post_process(Some(PostProcess::Tint));
    let (ctx, mut scene) = common::headless_scene(settings).await.unwrap();
    let image = common::render_frame(&ctx, &mut scene).await.unwrap();

    // default tint is (1, 0.6, 0.6)
    let centre = image.get_pixel(common::WIDTH / 2, common::HEIGHT / 2);
    assert!(centre[0] > 250, "{centre:?}");
    assert!(centre[1] < 230, "{centre:?}");
    assert_eq!(centre[1], centre[2]);
}
