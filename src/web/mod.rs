mod app;
mod background;
mod components;
mod scroll_host;

use std::any::Any;

use anyhow::{anyhow, Result};
use leptos::prelude::*;
use log::{info, warn};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Window};

use crate::config::SiteConfig;

use self::app::App;
use self::background::BackgroundView;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Live page. Dropping it (or calling `dispose`) unmounts the components,
/// which stops status polling, and releases the background's GPU and image
/// resources.
#[wasm_bindgen]
pub struct SiteHandle {
    page: Option<Box<dyn Any>>,
    background: Option<BackgroundView>,
}

#[wasm_bindgen]
impl SiteHandle {
    pub fn dispose(&mut self) {
        if let Some(mut background) = self.background.take() {
            background.teardown();
        }
        if self.page.take().is_some() {
            info!("site disposed");
        }
    }
}

impl Drop for SiteHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Mounts the page into the `.app` container and starts the background.
///
/// The background is optional: when it fails to start the page still works.
#[wasm_bindgen]
pub fn start() -> Result<SiteHandle, JsValue> {
    let config = SiteConfig::from_env();
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window not available"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document not available"))?;

    let root = app_root(&document, &config).map_err(|err| JsValue::from_str(&err.to_string()))?;
    let content = content_pane(&document, &root).map_err(|err| JsValue::from_str(&err.to_string()))?;

    let year = js_sys::Date::new_0().get_full_year() as i32;
    let page = {
        let config = config.clone();
        leptos::mount::mount_to(content, move || view! { <App config=config year=year/> })
    };
    let background = BackgroundView::start(&window, &document, &root, &config)
        .map_err(|err| warn!("background disabled: {err:#}"))
        .ok();

    info!("site started");
    Ok(SiteHandle {
        page: Some(Box::new(page)),
        background,
    })
}

fn app_root(document: &Document, config: &SiteConfig) -> Result<HtmlElement> {
    query(document, &config.nav.container_selector)?
        .dyn_into::<HtmlElement>()
        .map_err(|_| anyhow!("{} is not an HTML element", config.nav.container_selector))
}

/// The `.content` pane inside `root`, created when the page has none.
fn content_pane(document: &Document, root: &HtmlElement) -> Result<HtmlElement> {
    let content = match root.query_selector(".content").map_err(js_error)? {
        Some(content) => content,
        None => {
            let content = document.create_element("div").map_err(js_error)?;
            content.set_class_name("content");
            root.append_child(&content).map_err(js_error)?;
            content
        }
    };
    content
        .dyn_into::<HtmlElement>()
        .map_err(|_| anyhow!(".content is not an HTML element"))
}

pub(crate) fn page_origin(window: &Window) -> Result<Url> {
    let href = window.location().href().map_err(js_error)?;
    Url::parse(&href).map_err(|err| anyhow!("page URL {href:?} is invalid: {err}"))
}

fn query(document: &Document, selector: &str) -> Result<Element> {
    document
        .query_selector(selector)
        .map_err(js_error)?
        .ok_or_else(|| anyhow!("no element matches {selector}"))
}

pub(crate) fn js_error(err: JsValue) -> anyhow::Error {
    anyhow!("{err:?}")
}
