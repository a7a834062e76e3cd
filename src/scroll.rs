use std::cell::Cell;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Latest page scroll offset in CSS pixels.
///
/// Written by the scroll listener and read by the frame callback. Both run on
/// the same thread, so a plain cell is enough.
#[derive(Debug, Clone, Default)]
pub struct ScrollOffset(Rc<Cell<f32>>);

impl ScrollOffset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> f32 {
        self.0.get()
    }

    pub fn set(&self, pixels: f32) {
        self.0.set(if pixels.is_finite() { pixels } else { 0.0 });
    }
}

/// Perspective camera the background is viewed through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRig {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            fov_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraRig {
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.position, self.target, Vec3::Y);
        let projection = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            aspect.max(0.01),
            self.near,
            self.far,
        );
        projection * view
    }

    /// Height in world units of the visible frustum slice through `point`.
    pub fn visible_height_at(&self, point: Vec3) -> f32 {
        let distance = self.position.distance(point);
        2.0 * (self.fov_degrees.to_radians() / 2.0).tan() * distance
    }

    /// World units covered by one viewport pixel at `point`'s depth.
    pub fn world_per_pixel(&self, point: Vec3, viewport_height: u32) -> f32 {
        self.visible_height_at(point) / viewport_height.max(1) as f32
    }

    /// Vertical world position that keeps an object at depth `z` moving 1:1
    /// with a page scrolled by `scroll_px`. Depth matters: the conversion is
    /// recomputed for every object, every frame.
    pub fn scroll_to_world_y(&self, scroll_px: f32, z: f32, viewport_height: u32) -> f32 {
        scroll_px * self.world_per_pixel(Vec3::new(0.0, 0.0, z), viewport_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_cell_is_shared() {
        let writer = ScrollOffset::new();
        let reader = writer.clone();
        writer.set(120.0);
        assert_eq!(reader.get(), 120.0);
        writer.set(f32::NAN);
        assert_eq!(reader.get(), 0.0);
    }

    #[test]
    fn mapping_is_linear_in_scroll() {
        let rig = CameraRig::default();
        let once = rig.scroll_to_world_y(150.0, -1.0, 900);
        let twice = rig.scroll_to_world_y(300.0, -1.0, 900);
        assert!((twice - 2.0 * once).abs() < 1e-5);
        assert_eq!(rig.scroll_to_world_y(0.0, -1.0, 900), 0.0);
    }

    #[test]
    fn farther_objects_move_more_world_units() {
        let rig = CameraRig::default();
        let near = rig.world_per_pixel(Vec3::new(0.0, 0.0, 1.0), 1000);
        let far = rig.world_per_pixel(Vec3::new(0.0, 0.0, -5.0), 1000);
        assert!((far / near - 4.0).abs() < 1e-4);
    }

    #[test]
    fn visible_height_matches_field_of_view() {
        let rig = CameraRig::default();
        let height = rig.visible_height_at(Vec3::new(0.0, 0.0, -1.0));
        let expected = 2.0 * (22.5f32).to_radians().tan() * 4.0;
        assert!((height - expected).abs() < 1e-5);
    }
}
