//! Application event loop.
//!
//! [`run`] opens a window, creates the [`Context`], awaits the user's scene
//! constructor and then drives one [`SceneFlow`] frame by frame:
//!
//! 1. Collect keyboard and window events
//! 2. Handle the built-in keys (`Escape` exits, `P` toggles vsync)
//! 3. Let the flow react through [`SceneFlow::on_update`]
//! 4. Tick the scene (camera, light effects, post-processing)
//! 5. Render the scene into the surface and present it
//! 6. Every half second, show frame time and FPS in the window title

use std::{fmt::Debug, pin::Pin, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::KeyCode,
    window::Window,
};

use crate::{
    context::{Context, InitContext},
    error::RenderError,
    input::Keyboard,
    scene::Scene,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

const TITLE_INTERVAL: Duration = Duration::from_millis(500);

/// A running scene plus whatever the application keeps next to it.
pub trait SceneFlow {
    fn scene(&self) -> &Scene;

    fn scene_mut(&mut self) -> &mut Scene;

    /// Called once per frame before the scene ticks. `keyboard` holds this
    /// frame's key state.
    fn on_update(&mut self, _ctx: &Context, _keyboard: &Keyboard, _dt: Duration) {}
}

impl Debug for dyn SceneFlow + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SceneFlow")
    }
}

type FlowFuture = Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn SceneFlow>>>>>;

/// Builds the flow once the GPU context exists. Asset loading happens here.
pub type FlowConstructor = Box<dyn FnOnce(InitContext) -> FlowFuture>;

/// Wrap an async scene builder as a [`FlowConstructor`].
pub fn constructor<F, Fut, S>(build: F) -> FlowConstructor
where
    F: FnOnce(InitContext) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<S>> + 'static,
    S: SceneFlow + 'static,
{
    Box::new(move |ctx| -> FlowFuture {
        Box::pin(async move {
            let flow = build(ctx).await?;
            Ok(Box::new(flow) as Box<dyn SceneFlow>)
        })
    })
}

/// Averages frame times over [`TITLE_INTERVAL`] windows.
#[derive(Debug, Default, Clone)]
pub struct FrameStats {
    frames: u32,
    elapsed: Duration,
}

impl FrameStats {
    /// Count one frame. Once half a second has passed, returns the average
    /// frame time in milliseconds and the frame rate, and starts over.
    pub fn record(&mut self, dt: Duration) -> Option<(f32, u32)> {
        self.frames += 1;
        self.elapsed += dt;
        if self.elapsed < TITLE_INTERVAL {
            return None;
        }
        let frame_time = self.elapsed.as_secs_f32() / self.frames as f32;
        let fps = (1.0 / frame_time).round() as u32;
        *self = Self::default();
        Some((frame_time * 1000.0, fps))
    }
}

pub fn frame_title(title: &str, frame_time_ms: f32, fps: u32) -> String {
    format!("{title} - Frame Time: {frame_time_ms:.2}ms, FPS: {fps}")
}

/// GPU context and input state, alive once the window exists.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    title: String,
    keyboard: Keyboard,
    stats: FrameStats,
}

impl AppState {
    fn new(ctx: Context, title: String) -> Self {
        Self {
            ctx,
            title,
            keyboard: Keyboard::new(),
            stats: FrameStats::default(),
        }
    }

    fn resize(&mut self, flow: &mut dyn SceneFlow, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            flow.scene_mut().resize(&self.ctx.device, width, height);
        }
    }

    /// Match the present mode to the scene's lock-FPS setting.
    fn apply_vsync(&mut self, flow: &dyn SceneFlow) {
        self.ctx.set_vsync(flow.scene().settings().lock_fps);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop, flow: &mut dyn SceneFlow, dt: Duration) {
        if self.keyboard.key_hit(KeyCode::Escape) {
            event_loop.exit();
            return;
        }
        if self.keyboard.key_hit(KeyCode::KeyP) {
            let settings = flow.scene_mut().settings_mut();
            settings.lock_fps = !settings.lock_fps;
            self.apply_vsync(flow);
        }

        flow.on_update(&self.ctx, &self.keyboard, dt);
        flow.scene_mut().update(&self.keyboard, dt.as_secs_f32());
        self.keyboard.end_frame();

        match self.ctx.acquire() {
            Ok(frame) => {
                flow.scene_mut().render(&self.ctx, &frame.view);
                frame.present();
            }
            // Reconfigure the surface if it's lost or outdated
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.ctx.reconfigure();
            }
            Err(e) => log::error!("Unable to render {e}"),
        }

        if let Some((frame_time, fps)) = self.stats.record(dt)
            && let Some(window) = self.ctx.window()
        {
            window.set_title(&frame_title(&self.title, frame_time, fps));
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    title: String,
    state: Option<AppState>,
    flow: Option<Box<dyn SceneFlow>>,
    // Taken when the window is created.
    constructor: Option<FlowConstructor>,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, title: &str, constructor: FlowConstructor) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            title: title.to_string(),
            state: None,
            flow: None,
            constructor: Some(constructor),
            last_time: Instant::now(),
        })
    }

    fn start(&mut self, mut state: AppState, mut flow: Box<dyn SceneFlow>) {
        let [width, height] = state.ctx.size();
        flow.scene_mut().resize(&state.ctx.device, width, height);
        state.apply_vsync(flow.as_ref());
        if let Some(window) = state.ctx.window() {
            window.request_redraw();
        }
        log::info!("scene ready");
        self.last_time = Instant::now();
        self.state = Some(state);
        self.flow = Some(flow);
    }
}

pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Initialized {
        state: AppState,
        flow: Box<dyn SceneFlow>,
    },
    #[allow(dead_code)]
    Failed(anyhow::Error),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { flow, .. } => f.debug_struct("Initialized").field("flow", flow).finish(),
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructor) = self.constructor.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(self.title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let title = self.title.clone();
        let init_future = async move {
            let ctx = Context::new(window).await?;
            let flow = constructor((&ctx).into()).await?;
            Ok::<_, anyhow::Error>((AppState::new(ctx, title), flow))
        };

        #[cfg(not(target_arch = "wasm32"))]
        match self.async_runtime.block_on(init_future) {
            Ok((state, flow)) => self.start(state, flow),
            Err(e) => {
                log::error!("scene setup failed: {e:#}");
                event_loop.exit();
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok((state, flow)) => FlowEvent::Initialized { state, flow },
                    Err(e) => FlowEvent::Failed(e),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("event loop closed before the scene was ready");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized { state, flow } => self.start(state, flow),
            FlowEvent::Failed(e) => {
                log::error!("scene setup failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: winit::window::WindowId, event: WindowEvent) {
        let (Some(state), Some(flow)) = (&mut self.state, &mut self.flow) else {
            return;
        };

        state.keyboard.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(flow.as_mut(), size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                state.redraw(event_loop, flow.as_mut(), dt);
                if let Some(window) = state.ctx.window() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Open a window titled `title` and run the flow built by `constructor` until
/// the window closes.
pub fn run(title: &str, constructor: FlowConstructor) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, title, constructor)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_report_every_half_second() {
        let mut stats = FrameStats::default();
        for _ in 0..49 {
            assert_eq!(stats.record(Duration::from_millis(10)), None);
        }
        let (frame_time, fps) = stats.record(Duration::from_millis(10)).unwrap();
        assert!((frame_time - 10.0).abs() < 1e-3);
        assert_eq!(fps, 100);
        // the window starts over
        assert_eq!(stats.record(Duration::from_millis(10)), None);
    }

    #[test]
    fn title_shows_frame_time_and_fps() {
        assert_eq!(
            frame_title("Scene", 1.234, 812),
            "Scene - Frame Time: 1.23ms, FPS: 812"
        );
    }
}
