use web_sys::{Document, Element, ScrollBehavior, ScrollToOptions, Window};

use crate::nav::{ContainerMetrics, ScrollHost, ScrollTarget};

/// [`ScrollHost`] over the live DOM.
#[derive(Clone)]
pub struct DomScrollHost {
    window: Window,
    document: Document,
    container_selector: String,
}

impl DomScrollHost {
    pub fn new(window: &Window, document: &Document, container_selector: &str) -> Self {
        Self {
            window: window.clone(),
            document: document.clone(),
            container_selector: container_selector.to_string(),
        }
    }

    /// Host for the current page; `None` outside a browsing context.
    pub fn current(container_selector: &str) -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self::new(&window, &document, container_selector))
    }

    fn container_element(&self) -> Option<Element> {
        self.document
            .query_selector(&self.container_selector)
            .ok()
            .flatten()
    }
}

impl ScrollHost for DomScrollHost {
    fn anchor_top(&self, id: &str) -> Option<f64> {
        let anchor = self.document.get_element_by_id(id)?;
        Some(anchor.get_bounding_client_rect().top())
    }

    fn container(&self) -> Option<ContainerMetrics> {
        let container = self.container_element()?;
        Some(ContainerMetrics {
            scroll_height: f64::from(container.scroll_height()),
            client_height: f64::from(container.client_height()),
            scroll_top: f64::from(container.scroll_top()),
            rect_top: container.get_bounding_client_rect().top(),
        })
    }

    fn window_scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn smooth_scroll(&self, target: ScrollTarget, top: f64) {
        let options = ScrollToOptions::new();
        options.set_top(top);
        options.set_behavior(ScrollBehavior::Smooth);
        match target {
            ScrollTarget::Container => {
                if let Some(container) = self.container_element() {
                    container.scroll_to_with_scroll_to_options(&options);
                }
            }
            ScrollTarget::Window => self.window.scroll_to_with_scroll_to_options(&options),
        }
    }
}
