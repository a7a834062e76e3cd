use serde::{Deserialize, Serialize};

use crate::scroll::ScrollOffset;

/// Scroll length of the preview's imaginary page, in CSS pixels.
pub const DEFAULT_PAGE_LENGTH: f32 = 4800.0;
/// Pixels per wheel line and per arrow key press.
pub const LINE_HEIGHT: f32 = 40.0;

/// Keys that move the preview page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Space,
}

/// A mouse wheel step as reported by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelDelta {
    Lines(f32),
    Pixels(f32),
}

/// Turns wheel and key input into a clamped scroll position.
#[derive(Debug, Clone)]
pub struct PreviewScroller {
    offset: ScrollOffset,
    page_length: f32,
    viewport_height: f32,
}

impl PreviewScroller {
    pub fn new(offset: ScrollOffset, page_length: f32) -> Self {
        Self {
            offset,
            page_length: page_length.max(0.0),
            viewport_height: 0.0,
        }
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(0.0);
        self.scroll_to(self.offset.get());
    }

    /// Largest reachable offset.
    pub fn max_offset(&self) -> f32 {
        (self.page_length - self.viewport_height).max(0.0)
    }

    pub fn offset(&self) -> f32 {
        self.offset.get()
    }

    /// Positive deltas scroll up, matching winit's wheel convention.
    pub fn wheel(&mut self, delta: WheelDelta) -> f32 {
        let pixels = match delta {
            WheelDelta::Lines(lines) => lines * LINE_HEIGHT,
            WheelDelta::Pixels(pixels) => pixels,
        };
        self.scroll_to(self.offset.get() - pixels)
    }

    pub fn key(&mut self, key: NamedKey) -> f32 {
        let page = (self.viewport_height - LINE_HEIGHT).max(LINE_HEIGHT);
        let current = self.offset.get();
        let target = match key {
            NamedKey::Up => current - LINE_HEIGHT,
            NamedKey::Down => current + LINE_HEIGHT,
            NamedKey::PageUp => current - page,
            NamedKey::PageDown | NamedKey::Space => current + page,
            NamedKey::Home => 0.0,
            NamedKey::End => self.max_offset(),
        };
        self.scroll_to(target)
    }

    pub fn scroll_to(&mut self, pixels: f32) -> f32 {
        let clamped = if pixels.is_finite() {
            pixels.clamp(0.0, self.max_offset())
        } else {
            0.0
        };
        self.offset.set(clamped);
        clamped
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn map_virtual_keycode(code: winit::event::VirtualKeyCode) -> Option<NamedKey> {
    use winit::event::VirtualKeyCode as Vk;
    let key = match code {
        Vk::Up => NamedKey::Up,
        Vk::Down => NamedKey::Down,
        Vk::PageUp => NamedKey::PageUp,
        Vk::PageDown => NamedKey::PageDown,
        Vk::Home => NamedKey::Home,
        Vk::End => NamedKey::End,
        Vk::Space => NamedKey::Space,
        _ => return None,
    };
    Some(key)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn wheel_from_winit(delta: winit::event::MouseScrollDelta) -> WheelDelta {
    match delta {
        winit::event::MouseScrollDelta::LineDelta(_, y) => WheelDelta::Lines(y),
        winit::event::MouseScrollDelta::PixelDelta(position) => {
            WheelDelta::Pixels(position.y as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scroller() -> PreviewScroller {
        let mut scroller = PreviewScroller::new(ScrollOffset::new(), 2000.0);
        scroller.set_viewport_height(800.0);
        scroller
    }

    #[test]
    fn wheel_down_scrolls_the_page() {
        let mut scroller = scroller();
        assert_eq!(scroller.wheel(WheelDelta::Lines(-2.0)), 80.0);
        assert_eq!(scroller.wheel(WheelDelta::Pixels(30.0)), 50.0);
    }

    #[test]
    fn offset_is_clamped_to_the_page() {
        let mut scroller = scroller();
        assert_eq!(scroller.key(NamedKey::Up), 0.0);
        assert_eq!(scroller.key(NamedKey::End), 1200.0);
        assert_eq!(scroller.key(NamedKey::PageDown), 1200.0);
        assert_eq!(scroller.key(NamedKey::Home), 0.0);
        assert_eq!(scroller.scroll_to(f32::NAN), 0.0);
    }

    #[test]
    fn shrinking_the_page_pulls_the_offset_back() {
        let offset = ScrollOffset::new();
        let mut scroller = PreviewScroller::new(offset.clone(), 2000.0);
        scroller.set_viewport_height(100.0);
        scroller.scroll_to(1900.0);
        scroller.set_viewport_height(1000.0);
        assert_eq!(offset.get(), 1000.0);
    }

    #[test]
    fn page_keys_move_by_a_viewport() {
        let mut scroller = scroller();
        assert_eq!(scroller.key(NamedKey::PageDown), 760.0);
        assert_eq!(scroller.key(NamedKey::Space), 1200.0);
        assert_eq!(scroller.key(NamedKey::PageUp), 440.0);
    }
}
