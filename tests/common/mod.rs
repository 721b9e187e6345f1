use forward_ngin::{
    capture::capture_texture,
    config::RenderSettings,
    context::{Context, InitContext},
    input::Keyboard,
    scene::Scene,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 64;

/// A headless context and an empty scene drawing into it.
pub async fn headless_scene(settings: RenderSettings) -> anyhow::Result<(Context, Scene)> {
    let ctx = Context::headless(WIDTH, HEIGHT).await?;
    let scene = Scene::new(&InitContext::from(&ctx), settings.with_random_seed(1))?;
    Ok((ctx, scene))
}

/// Tick the scene once, render a frame and read it back.
pub async fn render_frame(ctx: &Context, scene: &mut Scene) -> anyhow::Result<image::RgbaImage> {
    scene.update(&Keyboard::new(), 1.0 / 60.0);
    let frame = ctx.acquire()?;
    scene.render(ctx, &frame.view);
    let target = ctx
        .target()
        .ok_or_else(|| anyhow::anyhow!("headless context without a target"))?;
    capture_texture(&ctx.device, &ctx.queue, &target.texture).await
}
