use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use gloo_events::EventListener;
use log::{debug, info, warn};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, HtmlImageElement, Window,
};

use super::scroll_host::DomScrollHost;
use super::{js_error, page_origin};
use crate::assets::AssetStore;
use crate::background::BackgroundScene;
use crate::cancel::CancelToken;
use crate::config::SiteConfig;
use crate::frames::{
    AcquireError, CompositingDecoder, Frame, FrameAcquisition, FrameAsset, FrameSource,
    FrameStrategy, LiveImage, PatchDecoder, StrategyKind,
};
use crate::nav::current_scroll_offset;
use crate::render::{Renderer, TickListeners};
use crate::scene::Scene;
use crate::scroll::ScrollOffset;
use crate::status::HttpTransport;
use crate::texture::{AnimatedTexture, TextureSampling};

const CANVAS_STYLE: &str = "position:fixed;inset:0;width:100vw;height:100vh;\
     z-index:-1;pointer-events:none;display:block";
const HIDDEN_IMAGE_STYLE: &str = "position:fixed;left:-9999px;top:-9999px;\
     width:1px;height:1px;opacity:0;pointer-events:none";

/// The fixed canvas behind the page and everything that keeps it moving.
pub struct BackgroundView {
    state: Rc<RefCell<FrameLoop>>,
    scene: Rc<RefCell<BackgroundScene>>,
    canvas: HtmlCanvasElement,
    cancel: CancelToken,
    _listeners: Vec<EventListener>,
}

struct FrameLoop {
    window: Window,
    listeners: TickListeners,
    scene: Rc<RefCell<BackgroundScene>>,
    renderer: Option<Renderer>,
    resized: Rc<Cell<bool>>,
    last_timestamp: Option<f64>,
    frame_id: Option<i32>,
    closure: Option<Closure<dyn FnMut(f64)>>,
    cancel: CancelToken,
}

impl BackgroundView {
    pub fn start(
        window: &Window,
        document: &Document,
        root: &HtmlElement,
        config: &SiteConfig,
    ) -> Result<Self> {
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| anyhow!("canvas element has the wrong type"))?;
        canvas.set_class_name("three-bg");
        canvas.set_attribute("style", CANVAS_STYLE).map_err(js_error)?;
        canvas.set_attribute("aria-hidden", "true").map_err(js_error)?;
        root.prepend_with_node_1(&canvas).map_err(js_error)?;

        let scroll = ScrollOffset::new();
        let scene = Scene::site_default()?.with_asset_paths(&config.background);
        let mut background = BackgroundScene::new(scene, scroll.clone(), &config.background);
        let css = css_size(window);
        background.resize(css.0.round() as u32, css.1.round() as u32);
        let cancel = background.cancel_token();
        let scene = Rc::new(RefCell::new(background));

        let host = DomScrollHost::new(window, document, &config.nav.container_selector);
        let sync = {
            let scroll = scroll.clone();
            move || scroll.set(current_scroll_offset(&host) as f32)
        };
        sync();
        let mut listeners = Vec::new();
        {
            let sync = sync.clone();
            listeners.push(EventListener::new(root, "scroll", move |_| sync()));
        }
        listeners.push(EventListener::new(window, "scroll", move |_| sync()));

        let resized = Rc::new(Cell::new(false));
        {
            let resized = Rc::clone(&resized);
            listeners.push(EventListener::new(window, "resize", move |_| {
                resized.set(true)
            }));
        }

        let mut ticks = TickListeners::new();
        ticks.register(Box::new(Rc::clone(&scene)));
        let state = Rc::new(RefCell::new(FrameLoop {
            window: window.clone(),
            listeners: ticks,
            scene: Rc::clone(&scene),
            renderer: None,
            resized,
            last_timestamp: None,
            frame_id: None,
            closure: None,
            cancel: cancel.clone(),
        }));

        spawn_renderer(&state, canvas.clone(), css, config.background.max_pixel_ratio);
        let origin = page_origin(window)?;
        spawn_asset_loads(&scene, document, &origin, &cancel)?;
        schedule_frame(&state)?;
        info!("background started");

        Ok(Self {
            state,
            scene,
            canvas,
            cancel,
            _listeners: listeners,
        })
    }

    /// Stops the frame loop and releases textures, geometry and the canvas.
    /// Loads still in flight see the cancelled token and drop their results.
    pub fn teardown(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.scene.borrow_mut().teardown();
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.frame_id.take() {
            let _ = state.window.cancel_animation_frame(id);
        }
        state.closure = None;
        if let Some(mut renderer) = state.renderer.take() {
            renderer.release();
        }
        drop(state);
        self.canvas.remove();
        self._listeners.clear();
    }
}

impl Drop for BackgroundView {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl FrameLoop {
    fn frame(&mut self, timestamp: f64) {
        let delta = match self.last_timestamp.replace(timestamp) {
            Some(previous) => Duration::from_secs_f64(((timestamp - previous) / 1000.0).max(0.0)),
            None => Duration::ZERO,
        };
        if self.resized.replace(false) {
            let css = css_size(&self.window);
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.resize(css);
            }
            self.scene
                .borrow_mut()
                .resize(css.0.round() as u32, css.1.round() as u32);
        }
        self.listeners.tick(delta);

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let mut scene = self.scene.borrow_mut();
        match renderer.render(&mut scene) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.resized.set(true);
            }
            Err(err) => debug!("frame skipped: {err}"),
        }
    }
}

fn schedule_frame(state: &Rc<RefCell<FrameLoop>>) -> Result<()> {
    let next = Rc::clone(state);
    let closure = Closure::wrap(Box::new(move |timestamp: f64| {
        if next.borrow().cancel.is_cancelled() {
            return;
        }
        next.borrow_mut().frame(timestamp);
        if let Err(err) = schedule_frame(&next) {
            warn!("frame loop stopped: {err:#}");
        }
    }) as Box<dyn FnMut(f64)>);

    let mut guard = state.borrow_mut();
    let id = guard
        .window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;
    guard.frame_id = Some(id);
    guard.closure = Some(closure);
    Ok(())
}

fn spawn_renderer(
    state: &Rc<RefCell<FrameLoop>>,
    canvas: HtmlCanvasElement,
    css: (f64, f64),
    max_pixel_ratio: f64,
) {
    let state = Rc::clone(state);
    spawn_local(async move {
        match Renderer::new(canvas, css, max_pixel_ratio).await {
            Ok(renderer) => {
                let mut state = state.borrow_mut();
                if state.cancel.is_cancelled() {
                    return;
                }
                state.renderer = Some(renderer);
            }
            Err(err) => warn!("3D background unavailable: {err:#}"),
        }
    });
}

fn spawn_asset_loads(
    scene: &Rc<RefCell<BackgroundScene>>,
    document: &Document,
    origin: &Url,
    cancel: &CancelToken,
) -> Result<()> {
    let transport = HttpTransport::new()?;
    let assets = AssetStore::in_memory();

    for (name, path) in scene.borrow().model_paths() {
        let url = origin.join(&path)?.to_string();
        let (scene, transport, assets, cancel) = (
            Rc::clone(scene),
            transport.clone(),
            assets.clone(),
            cancel.clone(),
        );
        spawn_local(async move {
            let fetched = transport
                .get_bytes(&url)
                .await
                .and_then(|bytes| assets.insert(&path, bytes));
            if cancel.is_cancelled() {
                return;
            }
            match fetched {
                Ok(()) => {
                    scene.borrow_mut().load_model(&assets, &name, &path);
                }
                Err(err) => warn!("{url}: {err:#}"),
            }
        });
    }

    let Some(path) = scene.borrow().texture_path() else {
        return Ok(());
    };
    let url = origin.join(&path)?.to_string();
    let frame_duration = scene.borrow().frame_duration();
    let strategies: Vec<Box<dyn FrameStrategy>> = vec![
        Box::new(CompositingDecoder),
        Box::new(PatchDecoder),
        Box::new(ImageElementStrategy {
            document: document.clone(),
        }),
    ];
    let scene = Rc::clone(scene);
    let cancel = cancel.clone();
    spawn_local(async move {
        let mut acquisition = FrameAcquisition::new(strategies, cancel);
        let asset = FrameAsset::new(url.clone(), None, frame_duration);
        let download = async {
            transport
                .get_bytes(&url)
                .await
                .and_then(|bytes| assets.insert(&path, bytes))
                .and_then(|()| assets.read(&path))
                .map_err(|err| debug!("texture download failed: {err:#}"))
                .ok()
        };
        if let Some(source) = acquisition.run_after(asset, download).await {
            let texture = AnimatedTexture::new(source, TextureSampling::fire_sprite());
            scene.borrow_mut().attach_texture(texture);
        }
    });
    Ok(())
}

fn css_size(window: &Window) -> (f64, f64) {
    let read = |value: Result<JsValue, JsValue>| {
        value.ok().and_then(|value| value.as_f64()).unwrap_or(1.0)
    };
    (read(window.inner_width()), read(window.inner_height()))
}

/// Last resort: let the browser animate a hidden `<img>` and copy whatever
/// frame it shows through a 2D canvas.
struct ImageElementStrategy {
    document: Document,
}

impl FrameStrategy for ImageElementStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LegacyElement
    }

    fn acquire(&self, asset: &FrameAsset) -> Result<FrameSource, AcquireError> {
        let unsupported = |_| AcquireError::Unsupported("image element unavailable");
        let image: HtmlImageElement = self
            .document
            .create_element("img")
            .map_err(unsupported)?
            .dyn_into()
            .map_err(|_| AcquireError::Unsupported("image element unavailable"))?;
        image
            .set_attribute("style", HIDDEN_IMAGE_STYLE)
            .map_err(unsupported)?;
        image.set_alt("");
        image.set_src(&asset.url);
        let body = self
            .document
            .body()
            .ok_or(AcquireError::Unsupported("document has no body"))?;
        body.append_child(&image).map_err(unsupported)?;

        let scratch: HtmlCanvasElement = self
            .document
            .create_element("canvas")
            .map_err(unsupported)?
            .dyn_into()
            .map_err(|_| AcquireError::Unsupported("canvas element unavailable"))?;
        let context: CanvasRenderingContext2d = scratch
            .get_context("2d")
            .map_err(unsupported)?
            .ok_or(AcquireError::Unsupported("2d context unavailable"))?
            .dyn_into()
            .map_err(|_| AcquireError::Unsupported("2d context unavailable"))?;

        Ok(FrameSource::Live(Box::new(ElementImage {
            image: Some(image),
            scratch,
            context,
        })))
    }
}

struct ElementImage {
    image: Option<HtmlImageElement>,
    scratch: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl LiveImage for ElementImage {
    fn capture(&mut self) -> Option<Frame> {
        let image = self.image.as_ref()?;
        let (width, height) = (image.natural_width(), image.natural_height());
        if !image.complete() || width == 0 || height == 0 {
            return None;
        }
        if (self.scratch.width(), self.scratch.height()) != (width, height) {
            self.scratch.set_width(width);
            self.scratch.set_height(height);
        }
        self.context
            .clear_rect(0.0, 0.0, f64::from(width), f64::from(height));
        self.context
            .draw_image_with_html_image_element(image, 0.0, 0.0)
            .ok()?;
        let data = self
            .context
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .ok()?;
        let Clamped(rgba) = data.data();
        Frame::new(width, height, rgba).ok()
    }

    fn release(&mut self) {
        if let Some(image) = self.image.take() {
            image.remove();
        }
        self.scratch.set_width(0);
        self.scratch.set_height(0);
    }
}
