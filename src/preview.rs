use std::any::Any;
use std::cell::RefCell;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::info;
use pollster::block_on;
use url::Url;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, KeyboardInput, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::WindowBuilder;

use vatra_site::cancel::CancelToken;
use vatra_site::input::{map_virtual_keycode, wheel_from_winit, DEFAULT_PAGE_LENGTH};
use vatra_site::{
    resolve_map_url, AssetStore, BackgroundScene, HttpTransport, PollOutcome, PreviewScroller,
    Renderer, Scene, ScrollOffset, SiteConfig, StatusBoard, StatusPoller, StatusSnapshot,
    TickListeners,
};

const USAGE: &str = "Usage: vatra-site [--assets DIR] [--summary-only] [--status-once] \
                     [--map-url URL] [--secure] [--print-config]";

pub fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let mut config = SiteConfig::from_env();
    if let Some(url) = &options.map_url {
        config.map.url = Some(url.clone());
    }

    if options.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let assets = match &options.assets {
        Some(dir) => AssetStore::open_dir(dir)
            .with_context(|| format!("failed to open assets {dir}"))?,
        None => AssetStore::in_memory(),
    };
    println!("Assets: {}", assets.describe());
    let scene = Scene::from_xml(&assets.scene_xml()?).context("failed to parse scene XML")?;

    println!(
        "Loaded scene with {} objects ({} lights)",
        scene.objects.len(),
        scene.light_count()
    );
    for object in &scene.objects {
        println!(" - {} ({})", object.name, object.object_type);
    }
    print_map(&config, options.secure)?;

    if options.status_once {
        print_status_once(&config)?;
    }

    if options.summary_only {
        return Ok(());
    }
    match run_interactive(&assets, &config) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable the preview)."
            );
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn print_map(config: &SiteConfig, secure: bool) -> Result<()> {
    let origin = Url::parse(if secure {
        "https://localhost/"
    } else {
        "http://localhost/"
    })?;
    println!("Map URL: {}", resolve_map_url(&config.map, &origin));
    println!("Proxy routes:");
    for rule in &config.map.proxy_rules {
        let mode = if rule.strip_prefix {
            "strip prefix"
        } else {
            "keep prefix"
        };
        println!(" - {} -> {} ({mode})", rule.prefix, rule.target);
    }
    Ok(())
}

fn print_status_once(config: &SiteConfig) -> Result<()> {
    let poller = StatusPoller::new(
        HttpTransport::new()?,
        config,
        StatusBoard::new(),
        CancelToken::new(),
    );
    let outcome = block_on(poller.poll_once());
    if let Some(snapshot) = outcome.snapshot() {
        println!(
            "Server {}: {} ({} bars)",
            config.server.address(),
            snapshot.player_label(),
            snapshot.bars(config.status.unknown_latency_bars)
        );
    }
    Ok(())
}

/// Keeps polling in the background while the preview window is open.
fn spawn_status_thread(
    config: &SiteConfig,
    board: StatusBoard,
    cancel: CancelToken,
) -> Result<thread::JoinHandle<()>> {
    let poller = StatusPoller::new(HttpTransport::new()?, config, board, cancel);
    let period = Duration::from_secs(config.status.poll_interval_secs.max(1));
    let unknown_bars = config.status.unknown_latency_bars;
    thread::Builder::new()
        .name("status-poller".into())
        .spawn(move || {
            poller.run_blocking(period, |outcome| match outcome {
                PollOutcome::Updated { source, snapshot } => info!(
                    "status via {}: {} ({} bars)",
                    source.name(),
                    snapshot.player_label(),
                    snapshot.bars(unknown_bars)
                ),
                PollOutcome::Offline(snapshot) => {
                    info!("status: {}", snapshot.player_label())
                }
                PollOutcome::Cancelled => {}
            });
        })
        .context("failed to spawn status thread")
}

fn run_interactive(assets: &AssetStore, config: &SiteConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop =
        event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
    let window = WindowBuilder::new()
        .with_title("VatraMC")
        .with_inner_size(LogicalSize::new(1280.0, 720.0))
        .build(&event_loop)
        .map_err(|err| WindowInitError::from_error("window", err))?;

    let scroll = ScrollOffset::new();
    let background = BackgroundScene::load(assets, &config.background, scroll.clone())?;
    let renderer = block_on(Renderer::new(window))?;
    let status = StatusBoard::new();
    let status_cancel = CancelToken::new();
    let status_thread = spawn_status_thread(config, status.clone(), status_cancel.clone())?;

    let mut app = Preview {
        renderer,
        scene: Rc::new(RefCell::new(background)),
        listeners: TickListeners::new(),
        scroller: PreviewScroller::new(scroll, DEFAULT_PAGE_LENGTH),
        status,
        shown_status: None,
        last_frame: Instant::now(),
        last_error: None,
    };
    app.listeners.register(Box::new(Rc::clone(&app.scene)));
    app.sync_viewport(app.renderer.size());

    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        if let Err(err) = app.process_event(&event, control_flow) {
            app.last_error = Some(err);
            control_flow.set_exit();
        }
    });

    app.shutdown();
    status_cancel.cancel();
    if status_thread.join().is_err() {
        eprintln!("status thread panicked");
    }

    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Preview {
    renderer: Renderer,
    scene: Rc<RefCell<BackgroundScene>>,
    listeners: TickListeners,
    scroller: PreviewScroller,
    status: StatusBoard,
    shown_status: Option<StatusSnapshot>,
    last_frame: Instant,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl Preview {
    fn process_event(&mut self, event: &Event<()>, control_flow: &mut ControlFlow) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => control_flow.set_exit(),
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                        self.sync_viewport(*size);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        self.renderer.resize(**new_inner_size);
                        self.sync_viewport(**new_inner_size);
                    }
                    WindowEvent::KeyboardInput { input, .. } => self.handle_keyboard(input),
                    WindowEvent::MouseWheel { delta, .. } => {
                        self.scroller.wheel(wheel_from_winit(*delta));
                    }
                    _ => {}
                }
            }
            Event::RedrawRequested(window_id) if *window_id == self.renderer.window_id() => {
                let now = Instant::now();
                let delta = now.duration_since(self.last_frame);
                self.last_frame = now;
                self.listeners.tick(delta);

                let mut scene = self.scene.borrow_mut();
                if let Err(err) = self.renderer.render(&mut scene) {
                    match err {
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                            self.renderer.recover();
                        }
                        wgpu::SurfaceError::OutOfMemory => {
                            return Err(anyhow!("GPU is out of memory"));
                        }
                        wgpu::SurfaceError::Timeout => {
                            info!("Surface timeout; retrying next frame");
                        }
                    }
                }
            }
            Event::MainEventsCleared => {
                self.refresh_title();
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    /// Mirrors the polled player count into the window title.
    fn refresh_title(&mut self) {
        let snapshot = self.status.snapshot();
        if self.shown_status == Some(snapshot) {
            return;
        }
        self.renderer
            .window()
            .set_title(&format!("VatraMC | {}", snapshot.player_label()));
        self.shown_status = Some(snapshot);
    }

    /// The scene and the scroller work in logical pixels, like the page.
    fn sync_viewport(&mut self, size: PhysicalSize<u32>) {
        let logical = size.to_logical::<f64>(self.renderer.window().scale_factor());
        self.scene
            .borrow_mut()
            .resize(logical.width.round() as u32, logical.height.round() as u32);
        self.scroller.set_viewport_height(logical.height as f32);
    }

    fn handle_keyboard(&mut self, input: &KeyboardInput) {
        if input.state != ElementState::Pressed {
            return;
        }
        if let Some(key) = input.virtual_keycode.and_then(map_virtual_keycode) {
            self.scroller.key(key);
        }
    }

    fn shutdown(&mut self) {
        self.scene.borrow_mut().teardown();
        self.renderer.release();
        println!("Final scroll offset: {:.0}px", self.scroller.offset());
    }
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    assets: Option<String>,
    summary_only: bool,
    status_once: bool,
    map_url: Option<String>,
    secure: bool,
    print_config: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--assets" => {
                    options.assets =
                        Some(args.next().ok_or_else(|| anyhow!("--assets needs a directory"))?);
                }
                "--map-url" => {
                    options.map_url =
                        Some(args.next().ok_or_else(|| anyhow!("--map-url needs a URL"))?);
                }
                "--summary-only" => options.summary_only = true,
                "--status-once" => options.status_once = true,
                "--secure" => options.secure = true,
                "--print-config" => options.print_config = true,
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}
