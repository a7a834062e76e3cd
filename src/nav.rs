/// Scroll state of the inner content pane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerMetrics {
    pub scroll_height: f64,
    pub client_height: f64,
    pub scroll_top: f64,
    /// Top of the container's bounding box, relative to the viewport.
    pub rect_top: f64,
}

impl ContainerMetrics {
    /// The pane scrolls on its own when its content overflows it.
    pub fn is_scrollable(&self) -> bool {
        self.scroll_height > self.client_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Container,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPlan {
    pub target: ScrollTarget,
    pub top: f64,
}

/// Page-side operations the scroll controller needs.
pub trait ScrollHost {
    /// Viewport-relative top of the anchor with this id.
    fn anchor_top(&self, id: &str) -> Option<f64>;
    fn container(&self) -> Option<ContainerMetrics>;
    fn window_scroll_y(&self) -> f64;
    fn smooth_scroll(&self, target: ScrollTarget, top: f64);
}

/// Where the anchor `id` should land, or `None` when it does not exist.
pub fn plan_scroll<H: ScrollHost + ?Sized>(
    host: &H,
    id: &str,
    header_offset: f64,
) -> Option<ScrollPlan> {
    let anchor_top = host.anchor_top(id)?;
    let plan = match host.container().filter(ContainerMetrics::is_scrollable) {
        Some(container) => ScrollPlan {
            target: ScrollTarget::Container,
            top: container.scroll_top + (anchor_top - container.rect_top) - header_offset,
        },
        None => ScrollPlan {
            target: ScrollTarget::Window,
            top: anchor_top + host.window_scroll_y() - header_offset,
        },
    };
    Some(plan)
}

/// Scroll offset as seen by the background: the pane when it scrolls on its
/// own, otherwise the window.
pub fn current_scroll_offset<H: ScrollHost + ?Sized>(host: &H) -> f64 {
    match host.container().filter(ContainerMetrics::is_scrollable) {
        Some(container) => container.scroll_top,
        None => host.window_scroll_y(),
    }
}

/// Header navigation: anchor scrolling plus the mobile menu toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    header_offset: f64,
    menu_open: bool,
}

impl Navigator {
    pub fn new(header_offset: f64) -> Self {
        Self {
            header_offset,
            menu_open: false,
        }
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu_open
    }

    /// Value for the toggle button's `aria-expanded`.
    pub fn aria_expanded(&self) -> &'static str {
        if self.menu_open {
            "true"
        } else {
            "false"
        }
    }

    pub fn toggle_menu(&mut self) -> bool {
        self.menu_open = !self.menu_open;
        self.menu_open
    }

    /// Smooth-scrolls to `id` and closes the menu. Missing anchors are a no-op.
    pub fn scroll_to<H: ScrollHost + ?Sized>(&mut self, host: &H, id: &str) -> Option<ScrollPlan> {
        let plan = plan_scroll(host, id, self.header_offset)?;
        host.smooth_scroll(plan.target, plan.top);
        self.menu_open = false;
        Some(plan)
    }
}
