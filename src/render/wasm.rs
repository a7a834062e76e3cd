use anyhow::{anyhow, Context, Result};
use log::info;
use web_sys::HtmlCanvasElement;

use super::GpuScene;
use crate::background::BackgroundScene;

/// Draws the background into the page's fixed canvas through WebGL2.
pub struct Renderer {
    canvas: HtmlCanvasElement,
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    gpu: GpuScene,
    max_pixel_ratio: f64,
}

impl Renderer {
    /// `max_pixel_ratio` caps the device pixel ratio the canvas is sized with.
    pub async fn new(
        canvas: HtmlCanvasElement,
        css_size: (f64, f64),
        max_pixel_ratio: f64,
    ) -> Result<Self> {
        let (width, height) = backing_size(css_size, device_pixel_ratio(), max_pixel_ratio);
        canvas.set_width(width);
        canvas.set_height(height);

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::GL,
            dx12_shader_compiler: Default::default(),
        });
        let surface = instance
            .create_surface_from_canvas(canvas.clone())
            .map_err(|err| anyhow!("failed to create canvas surface: {err}"))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("WebGL2 is not available")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("background-device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
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
            .context("canvas reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        info!("canvas surface {width}x{height} ({format:?})");

        let gpu = GpuScene::new(&device, &queue, format, width, height);
        Ok(Self {
            canvas,
            surface,
            device,
            queue,
            config,
            gpu,
            max_pixel_ratio,
        })
    }

    /// Resizes to the canvas' CSS size. Returns the backing size in pixels.
    pub fn resize(&mut self, css_size: (f64, f64)) -> (u32, u32) {
        let (width, height) =
            backing_size(css_size, device_pixel_ratio(), self.max_pixel_ratio);
        if (width, height) != (self.config.width, self.config.height) {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.gpu.resize(&self.device, width, height);
        }
        (width, height)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
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

    pub fn release(&mut self) {
        self.gpu.clear();
    }
}

fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|window| window.device_pixel_ratio())
        .unwrap_or(1.0)
}

/// Backing-store size for a canvas of `css_size` at a clamped pixel ratio.
pub fn backing_size(css_size: (f64, f64), pixel_ratio: f64, max_pixel_ratio: f64) -> (u32, u32) {
    let ratio = pixel_ratio.clamp(1.0, max_pixel_ratio.max(1.0));
    let scale = |edge: f64| ((edge * ratio).round() as u32).max(1);
    (scale(css_size.0), scale(css_size.1))
}
