use anyhow::{anyhow, Context, Result};
use log::info;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::GpuScene;
use crate::background::BackgroundScene;

/// Draws the background into a desktop window.
pub struct Renderer {
    // The surface borrows the window's native handle, so it has to go first.
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    gpu: GpuScene,
    window: Window,
}

impl Renderer {
    pub async fn new(window: Window) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            dx12_shader_compiler: Default::default(),
        });
        // SAFETY: `window` is stored next to the surface and dropped after it.
        let surface = unsafe { instance.create_surface(&window) }
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("rendering with {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("background-device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let gpu = GpuScene::new(&device, &queue, format, size.width, size.height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            gpu,
            window,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Resizes the swap chain and depth buffer. Zero-area sizes (minimised
    /// windows) are ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.gpu
            .resize(&self.device, new_size.width, new_size.height);
    }

    pub fn render(&mut self, scene: &mut BackgroundScene) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.gpu.render(&self.device, &self.queue, &view, scene);
        output.present();
        Ok(())
    }

    /// Reconfigures the surface after it was lost or outdated.
    pub fn recover(&mut self) {
        self.resize(self.size);
    }

    /// Drops uploaded geometry and textures.
    pub fn release(&mut self) {
        self.gpu.clear();
    }
}
