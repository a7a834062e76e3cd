use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::frames::{AnimatedFrameSet, Frame, FrameCanvas, FrameSource, FrameStepper, LiveImage};

/// Canvas size used until a live image reports its real dimensions.
const PLACEHOLDER_EDGE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Wrap {
    #[default]
    ClampToEdge,
    Repeat,
}

/// How a texture is sampled and where its UVs land.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureSampling {
    pub filter: Filter,
    pub wrap: Wrap,
    pub mipmaps: bool,
    pub srgb: bool,
    pub flip_y: bool,
    /// Pivot for `rotation`, in UV space.
    pub center: Vec2,
    /// Counter-clockwise rotation in radians.
    pub rotation: f32,
}

impl Default for TextureSampling {
    fn default() -> Self {
        Self {
            filter: Filter::Nearest,
            wrap: Wrap::Repeat,
            mipmaps: false,
            srgb: true,
            flip_y: false,
            center: Vec2::ZERO,
            rotation: 0.0,
        }
    }
}

impl TextureSampling {
    /// Pixel-art sampling for model base colours: nearest, no mipmaps, sRGB.
    pub fn pixelated() -> Self {
        Self::default()
    }

    /// The fire sprite: clamped, unflipped, turned a quarter clockwise about
    /// the middle of the image.
    pub fn fire_sprite() -> Self {
        Self {
            wrap: Wrap::ClampToEdge,
            center: Vec2::splat(0.5),
            rotation: -FRAC_PI_2,
            ..Self::default()
        }
    }

    /// UV matrix applied in the shader: flip, then rotate about `center`.
    pub fn uv_transform(&self) -> Mat3 {
        let (s, c) = self.rotation.sin_cos();
        let Vec2 { x: cx, y: cy } = self.center;
        let rotate = Mat3::from_cols(
            Vec3::new(c, -s, 0.0),
            Vec3::new(s, c, 0.0),
            Vec3::new(-(c * cx + s * cy) + cx, -(-s * cx + c * cy) + cy, 1.0),
        );
        if self.flip_y {
            let flip = Mat3::from_cols(Vec3::X, Vec3::NEG_Y, Vec3::new(0.0, 1.0, 1.0));
            rotate * flip
        } else {
            rotate
        }
    }

    /// The first two rows of [`uv_transform`](Self::uv_transform), padded
    /// for a uniform buffer.
    pub fn uv_rows(&self) -> [[f32; 4]; 2] {
        let m = self.uv_transform();
        [
            [m.x_axis.x, m.y_axis.x, m.z_axis.x, 0.0],
            [m.x_axis.y, m.y_axis.y, m.z_axis.y, 0.0],
        ]
    }

    pub fn apply(&self, uv: Vec2) -> Vec2 {
        self.uv_transform().transform_point2(uv)
    }
}

enum Feed {
    Sequence {
        frames: AnimatedFrameSet,
        stepper: FrameStepper,
    },
    Live(Box<dyn LiveImage>),
}

/// A canvas-backed texture fed either by a decoded frame set that we step
/// ourselves or by a live image the host animates.
pub struct AnimatedTexture {
    feed: Option<Feed>,
    canvas: FrameCanvas,
    sampling: TextureSampling,
}

impl AnimatedTexture {
    pub fn new(source: FrameSource, sampling: TextureSampling) -> Self {
        match source {
            FrameSource::Sequence(frames) => {
                let (width, height) = frames.dimensions();
                let mut canvas = FrameCanvas::new(width, height);
                if let Some(first) = frames.get(0) {
                    canvas.draw(first);
                }
                let stepper = FrameStepper::new(frames.len(), frames.frame_duration());
                Self {
                    feed: Some(Feed::Sequence { frames, stepper }),
                    canvas,
                    sampling,
                }
            }
            FrameSource::Live(mut image) => {
                let canvas = match image.capture() {
                    Some(frame) => canvas_for(&frame),
                    None => FrameCanvas::new(PLACEHOLDER_EDGE, PLACEHOLDER_EDGE),
                };
                Self {
                    feed: Some(Feed::Live(image)),
                    canvas,
                    sampling,
                }
            }
        }
    }

    /// Advances the texture by `delta`. Returns `true` when the canvas needs
    /// to be uploaded again.
    pub fn tick(&mut self, delta: Duration) -> bool {
        match self.feed.as_mut() {
            Some(Feed::Sequence { frames, stepper }) => {
                if stepper.advance(delta) > 0 {
                    if let Some(frame) = frames.get(stepper.index()) {
                        self.canvas.draw(frame);
                    }
                }
            }
            Some(Feed::Live(image)) => {
                if let Some(frame) = image.capture() {
                    if (frame.width, frame.height) != (self.canvas.width(), self.canvas.height()) {
                        self.canvas = FrameCanvas::new(frame.width, frame.height);
                    }
                    self.canvas.draw(&frame);
                }
                // The host decides the cadence; re-upload every tick.
                self.canvas.mark_dirty();
            }
            None => {}
        }
        self.canvas.is_dirty()
    }

    pub fn frame_index(&self) -> Option<usize> {
        match self.feed.as_ref()? {
            Feed::Sequence { stepper, .. } => Some(stepper.index()),
            Feed::Live(_) => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.feed, Some(Feed::Live(_)))
    }

    pub fn canvas(&self) -> &FrameCanvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut FrameCanvas {
        &mut self.canvas
    }

    pub fn sampling(&self) -> &TextureSampling {
        &self.sampling
    }

    pub fn is_released(&self) -> bool {
        self.feed.is_none()
    }

    pub fn release(&mut self) {
        match self.feed.take() {
            Some(Feed::Sequence { mut frames, .. }) => frames.close(),
            Some(Feed::Live(mut image)) => image.release(),
            None => {}
        }
        self.canvas.release();
    }
}

impl std::fmt::Debug for AnimatedTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedTexture")
            .field("frame_index", &self.frame_index())
            .field("live", &self.is_live())
            .field("canvas", &self.canvas)
            .finish()
    }
}

fn canvas_for(frame: &Frame) -> FrameCanvas {
    let mut canvas = FrameCanvas::new(frame.width, frame.height);
    canvas.draw(frame);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::DEFAULT_FRAME_DURATION;
    use std::cell::Cell;
    use std::rc::Rc;

    fn solid(value: u8) -> Frame {
        Frame::new(2, 2, vec![value; 16]).unwrap()
    }

    fn sequence(values: &[u8]) -> FrameSource {
        let frames = values.iter().copied().map(solid).collect();
        FrameSource::Sequence(AnimatedFrameSet::new(frames, DEFAULT_FRAME_DURATION).unwrap())
    }

    struct Host {
        captures: Rc<Cell<u32>>,
        released: Rc<Cell<bool>>,
    }

    impl LiveImage for Host {
        fn capture(&mut self) -> Option<Frame> {
            self.captures.set(self.captures.get() + 1);
            Some(solid(7))
        }

        fn release(&mut self) {
            self.released.set(true);
        }
    }

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn fire_sprite_rotates_a_quarter_turn_clockwise() {
        let sampling = TextureSampling::fire_sprite();
        assert!(close(sampling.apply(Vec2::new(0.0, 0.0)), Vec2::new(1.0, 0.0)));
        assert!(close(sampling.apply(Vec2::new(1.0, 0.0)), Vec2::new(1.0, 1.0)));
        assert!(close(sampling.apply(Vec2::new(0.5, 0.5)), Vec2::new(0.5, 0.5)));
    }

    #[test]
    fn uv_rows_match_the_matrix() {
        let rows = TextureSampling::fire_sprite().uv_rows();
        let uv = Vec2::new(0.25, 0.75);
        let u = rows[0][0] * uv.x + rows[0][1] * uv.y + rows[0][2];
        let v = rows[1][0] * uv.x + rows[1][1] * uv.y + rows[1][2];
        assert!(close(Vec2::new(u, v), Vec2::new(0.25, 0.25)));
    }

    #[test]
    fn identity_sampling_leaves_uvs_alone() {
        let uv = Vec2::new(0.3, 0.9);
        assert!(close(TextureSampling::pixelated().apply(uv), uv));
    }

    #[test]
    fn sequence_redraws_only_when_a_frame_elapses() {
        let mut texture = AnimatedTexture::new(sequence(&[1, 2, 3]), TextureSampling::fire_sprite());
        assert!(texture.canvas_mut().take_dirty());
        assert!(!texture.tick(Duration::from_millis(20)));
        assert!(texture.tick(Duration::from_millis(30)));
        assert_eq!(texture.frame_index(), Some(1));
        assert_eq!(texture.canvas().pixels()[0], 2);
    }

    #[test]
    fn sequence_catches_up_within_one_tick() {
        let mut texture = AnimatedTexture::new(sequence(&[1, 2, 3, 4]), TextureSampling::default());
        texture.tick(DEFAULT_FRAME_DURATION * 3);
        assert_eq!(texture.frame_index(), Some(3));
        assert_eq!(texture.canvas().pixels()[0], 4);
    }

    #[test]
    fn live_feed_is_dirty_every_tick() {
        let captures = Rc::new(Cell::new(0));
        let released = Rc::new(Cell::new(false));
        let host = Host {
            captures: Rc::clone(&captures),
            released: Rc::clone(&released),
        };
        let mut texture =
            AnimatedTexture::new(FrameSource::Live(Box::new(host)), TextureSampling::default());
        assert_eq!(texture.frame_index(), None);
        assert_eq!((texture.canvas().width(), texture.canvas().height()), (2, 2));
        for _ in 0..3 {
            texture.canvas_mut().take_dirty();
            assert!(texture.tick(Duration::ZERO));
        }
        assert_eq!(captures.get(), 4);

        texture.release();
        assert!(released.get());
        assert!(texture.is_released());
        assert!(texture.canvas().pixels().is_empty());
    }
}
