mod gpu;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use crate::model::{MaterialParams, Shading};
use crate::scene::Lighting;
use crate::scroll::CameraRig;
use crate::texture::TextureSampling;

pub use gpu::GpuScene;
#[cfg(not(target_arch = "wasm32"))]
pub use native::Renderer;
#[cfg(target_arch = "wasm32")]
pub use wasm::Renderer;

/// Something that runs once per rendered frame.
pub trait TickListener {
    fn tick(&mut self, delta: Duration);
}

impl<T: TickListener + ?Sized> TickListener for Rc<RefCell<T>> {
    fn tick(&mut self, delta: Duration) {
        self.borrow_mut().tick(delta);
    }
}

/// Handle returned by [`TickListeners::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// The frame loop's listener list. Listeners run in registration order.
#[derive(Default)]
pub struct TickListeners {
    next: u64,
    listeners: Vec<(TickHandle, Box<dyn TickListener>)>,
}

impl TickListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn TickListener>) -> TickHandle {
        let handle = TickHandle(self.next);
        self.next += 1;
        self.listeners.push((handle, listener));
        handle
    }

    /// Returns `false` when the handle was already gone.
    pub fn unregister(&mut self, handle: TickHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn tick(&mut self, delta: Duration) {
        for (_, listener) in &mut self.listeners {
            listener.tick(delta);
        }
    }
}

/// sRGB-encoded colour to linear light.
pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    let channel = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(color.x), channel(color.y), channel(color.z))
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub sky_color: [f32; 4],
    pub ground_color: [f32; 4],
    /// xyz direction towards the sun.
    pub sun_direction: [f32; 4],
    /// rgb colour, w intensity.
    pub sun_color: [f32; 4],
    /// rgb colour, w exposure.
    pub fog_color: [f32; 4],
    /// x near, y far, z set when the target needs sRGB encoding in the shader.
    pub fog_range: [f32; 4],
}

impl GlobalUniform {
    pub fn new(camera: &CameraRig, lighting: &Lighting, exposure: f32, aspect: f32) -> Self {
        let sky = srgb_to_linear(lighting.hemisphere.sky) * lighting.hemisphere.intensity;
        let ground = srgb_to_linear(lighting.hemisphere.ground) * lighting.hemisphere.intensity;
        Self {
            view_proj: camera.view_proj(aspect).to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            sky_color: sky.extend(1.0).into(),
            ground_color: ground.extend(1.0).into(),
            sun_direction: lighting.sun.direction().extend(0.0).into(),
            sun_color: srgb_to_linear(lighting.sun.color)
                .extend(lighting.sun.intensity)
                .into(),
            fog_color: srgb_to_linear(lighting.fog.color).extend(exposure).into(),
            fog_range: [lighting.fog.near, lighting.fog.far, 0.0, 0.0],
        }
    }
}

/// Shader flag bits carried in [`ObjectUniform::material`]'s w component.
pub mod flags {
    pub const UNLIT: u32 = 1;
    pub const FLAT: u32 = 2;
    pub const TEXTURED: u32 = 4;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub color: [f32; 4],
    pub uv_row0: [f32; 4],
    pub uv_row1: [f32; 4],
    /// x roughness, y metalness, z specular, w flag bits.
    pub material: [f32; 4],
    /// rgb emissive, w alpha cutoff.
    pub emissive: [f32; 4],
}

impl ObjectUniform {
    pub fn new(
        model: Mat4,
        material: &MaterialParams,
        sampling: &TextureSampling,
        textured: bool,
    ) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        let mut bits = 0;
        if material.shading == Shading::Unlit {
            bits |= flags::UNLIT;
        }
        if material.flat_shading {
            bits |= flags::FLAT;
        }
        if textured {
            bits |= flags::TEXTURED;
        }
        let [uv_row0, uv_row1] = sampling.uv_rows();
        let base = material.base_color;
        let linear = srgb_to_linear(base.truncate());
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            color: linear.extend(base.w).into(),
            uv_row0,
            uv_row1,
            material: [
                material.roughness,
                material.metalness,
                material.specular,
                bits as f32,
            ],
            emissive: material.emissive.extend(material.alpha_cutoff).into(),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use std::cell::Cell;

    struct Counter(Rc<Cell<u32>>);

    impl TickListener for Counter {
        fn tick(&mut self, _delta: Duration) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn unregistered_listeners_stop_ticking() {
        let count = Rc::new(Cell::new(0));
        let mut listeners = TickListeners::new();
        let handle = listeners.register(Box::new(Counter(Rc::clone(&count))));
        listeners.tick(Duration::from_millis(16));
        assert!(listeners.unregister(handle));
        assert!(!listeners.unregister(handle));
        listeners.tick(Duration::from_millis(16));
        assert_eq!(count.get(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn srgb_endpoints_are_fixed() {
        assert_eq!(srgb_to_linear(Vec3::ZERO), Vec3::ZERO);
        assert!((srgb_to_linear(Vec3::ONE) - Vec3::ONE).length() < 1e-6);
        assert!(srgb_to_linear(Vec3::splat(0.5)).x < 0.25);
    }

    #[test]
    fn globals_carry_exposure_and_fog() {
        let scene = Scene::site_default().unwrap();
        let globals = GlobalUniform::new(&scene.camera, &scene.lighting, scene.exposure, 1.6);
        assert_eq!(globals.fog_color[3], 1.05);
        assert_eq!(globals.fog_range[..2], [60.0, 350.0]);
        assert_eq!(globals.sun_color[3], 1.6);
        assert_eq!(globals.camera_position, [0.0, 0.0, 3.0, 1.0]);
    }

    #[test]
    fn sprite_uniform_is_unlit_and_textured() {
        let material = MaterialParams::sprite(0.1);
        let uniform = ObjectUniform::new(
            Mat4::IDENTITY,
            &material,
            &TextureSampling::fire_sprite(),
            true,
        );
        assert_eq!(uniform.material[3] as u32, flags::UNLIT | flags::TEXTURED);
        assert_eq!(uniform.emissive[3], 0.1);
        assert!((uniform.uv_row0[2] - 1.0).abs() < 1e-6);
    }
}
