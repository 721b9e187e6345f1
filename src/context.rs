//! Device, queue and the frame target.
//!
//! A [`Context`] either presents to a window surface or, when built with
//! [`Context::headless`], renders into an off-screen texture that can be read
//! back with [`capture`](crate::capture).

use std::sync::Arc;

use winit::window::Window;

use crate::{data_structures::texture::Texture, error::RenderError};

/// Format of the off-screen target of a headless context.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    /// Present only on headless contexts.
    target: Option<Texture>,
    pub(crate) depth_texture: Texture,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

/// One frame's colour target. Dropping it without [`present`](Self::present)
/// discards a surface frame.
pub struct Frame {
    surface_texture: Option<wgpu::SurfaceTexture>,
    pub view: wgpu::TextureView,
}

impl Frame {
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        #[cfg(not(target_arch = "wasm32"))]
        backends: wgpu::Backends::PRIMARY,
        #[cfg(target_arch = "wasm32")]
        backends: wgpu::Backends::GL,
        ..Default::default()
    })
}

async fn request_device(adapter: &wgpu::Adapter) -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    let info = adapter.get_info();
    log::info!("using {} ({:?})", info.name, info.backend);
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("forward-ngin device"),
            required_features: wgpu::Features::empty(),
            // WebGL doesn't support all of wgpu's features
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            memory_hints: Default::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            trace: wgpu::Trace::Off,
        })
        .await?;
    Ok((device, queue))
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = instance();
        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders write linear colour and rely on an sRGB target to encode it.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("surface {}x{} {:?}", config.width, config.height, config.format);

        let depth_texture = Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        Ok(Self {
            window: Some(window),
            surface: Some(surface),
            target: None,
            depth_texture,
            device,
            queue,
            config,
        })
    }

    /// A context without a window, rendering into a `width`×`height`
    /// [`HEADLESS_FORMAT`] texture.
    pub async fn headless(width: u32, height: u32) -> anyhow::Result<Self> {
        let instance = instance();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: HEADLESS_FORMAT,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let target = Texture::create_render_target(&device, [config.width, config.height], HEADLESS_FORMAT, "headless target");
        let depth_texture = Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        Ok(Self {
            window: None,
            surface: None,
            target: Some(target),
            depth_texture,
            device,
            queue,
            config,
        })
    }

    pub fn size(&self) -> [u32; 2] {
        [self.config.width, self.config.height]
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_texture.view
    }

    /// The off-screen texture of a headless context.
    pub fn target(&self) -> Option<&Texture> {
        self.target.as_ref()
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    /// Returns `false` (and changes nothing) for a zero-sized request.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize to {width}x{height}");
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
        if self.target.is_some() {
            self.target = Some(Texture::create_render_target(
                &self.device,
                [width, height],
                self.config.format,
                "headless target",
            ));
        }
        self.depth_texture = Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        true
    }

    /// Present with vsync (`Fifo`) or as fast as possible.
    pub fn set_vsync(&mut self, vsync: bool) {
        self.config.present_mode = if vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
        log::debug!("present mode {:?}", self.config.present_mode);
    }

    /// The texture to draw this frame into.
    pub fn acquire(&self) -> Result<Frame, RenderError> {
        match (&self.surface, &self.target) {
            (Some(surface), _) => {
                let output = surface.get_current_texture()?;
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                Ok(Frame {
                    surface_texture: Some(output),
                    view,
                })
            }
            (None, Some(target)) => Ok(Frame {
                surface_texture: None,
                view: target.view.clone(),
            }),
            (None, None) => Err(RenderError::Surface(wgpu::SurfaceError::Lost)),
        }
    }

    /// Reconfigure after the surface was lost or became outdated.
    pub fn reconfigure(&mut self) {
        let [width, height] = self.size();
        self.resize(width, height);
    }
}

/// The parts of a [`Context`] needed to build a scene.
///
/// Device and queue are reference counted, so this is cheap to clone and can
/// move into an async scene constructor.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            config: ctx.config.clone(),
        }
    }
}
