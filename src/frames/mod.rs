mod decode;
mod loader;

use std::time::Duration;

use thiserror::Error;

pub use decode::{
    default_strategies, CompositingDecoder, FrameAsset, FrameSource, FrameStrategy, LiveImage,
    PatchDecoder, StillImage, StrategyKind,
};
pub use loader::{AcquisitionState, FrameAcquisition};

pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(50);

/// Edge length used when a source reports zero-sized frames.
const FALLBACK_EDGE: u32 = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The strategy cannot run in this environment or on this input.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("image has no frames")]
    Empty,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, AcquireError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(AcquireError::Decode(format!(
                "frame buffer holds {} bytes, {width}x{height} needs {expected}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Looping sequence of decoded frames, owned by the background for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedFrameSet {
    frames: Vec<Frame>,
    frame_duration: Duration,
}

impl AnimatedFrameSet {
    pub fn new(frames: Vec<Frame>, frame_duration: Duration) -> Result<Self, AcquireError> {
        if frames.is_empty() {
            return Err(AcquireError::Empty);
        }
        Ok(Self {
            frames,
            frame_duration,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Canvas size implied by the first frame.
    pub fn dimensions(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(|frame| (frame.width, frame.height))
            .filter(|(w, h)| *w > 0 && *h > 0)
            .unwrap_or((FALLBACK_EDGE, FALLBACK_EDGE))
    }

    pub fn close(&mut self) {
        self.frames = Vec::new();
    }
}

/// Fixed-rate frame clock.
///
/// Elapsed time accumulates; each whole frame duration in the accumulator
/// advances exactly one frame, so a late tick catches up instead of skipping
/// straight to the newest frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStepper {
    frame_duration: Duration,
    accumulator: Duration,
    index: usize,
    count: usize,
}

impl FrameStepper {
    pub fn new(count: usize, frame_duration: Duration) -> Self {
        Self {
            frame_duration,
            accumulator: Duration::ZERO,
            index: 0,
            count,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulator
    }

    pub fn advance(&mut self, delta: Duration) -> u32 {
        if self.count == 0 || self.frame_duration.is_zero() {
            return 0;
        }
        self.accumulator += delta;
        let mut advanced = 0;
        while self.accumulator >= self.frame_duration {
            self.accumulator -= self.frame_duration;
            self.index = (self.index + 1) % self.count;
            advanced += 1;
        }
        advanced
    }
}

/// CPU-side pixel buffer mirrored into a GPU texture when dirty.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    dirty: bool,
}

impl FrameCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            dirty: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Clears the canvas and draws `frame` at the origin, clipped to the canvas.
    pub fn draw(&mut self, frame: &Frame) {
        self.pixels.fill(0);
        let rows = frame.height.min(self.height) as usize;
        let row_bytes = frame.width.min(self.width) as usize * 4;
        let src_stride = frame.width as usize * 4;
        let dst_stride = self.width as usize * 4;
        for row in 0..rows {
            let src = &frame.rgba[row * src_stride..row * src_stride + row_bytes];
            self.pixels[row * dst_stride..row * dst_stride + row_bytes].copy_from_slice(src);
        }
        self.dirty = true;
    }

    pub fn release(&mut self) {
        self.pixels = Vec::new();
        self.dirty = false;
    }
}

impl std::fmt::Debug for FrameCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCanvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(width, height, vec![value; (width * height * 4) as usize]).unwrap()
    }

    #[test]
    fn zero_delta_never_advances() {
        let mut stepper = FrameStepper::new(4, DEFAULT_FRAME_DURATION);
        for _ in 0..100 {
            assert_eq!(stepper.advance(Duration::ZERO), 0);
        }
        assert_eq!(stepper.index(), 0);
    }

    #[test]
    fn catches_up_by_whole_frames() {
        let mut stepper = FrameStepper::new(10, DEFAULT_FRAME_DURATION);
        assert_eq!(stepper.advance(DEFAULT_FRAME_DURATION * 3), 3);
        assert_eq!(stepper.index(), 3);
        assert_eq!(stepper.accumulated(), Duration::ZERO);
    }

    #[test]
    fn partial_frames_accumulate() {
        let mut stepper = FrameStepper::new(10, DEFAULT_FRAME_DURATION);
        assert_eq!(stepper.advance(Duration::from_millis(30)), 0);
        assert_eq!(stepper.advance(Duration::from_millis(30)), 1);
        assert_eq!(stepper.accumulated(), Duration::from_millis(10));
    }

    #[test]
    fn index_wraps_around() {
        let mut stepper = FrameStepper::new(2, DEFAULT_FRAME_DURATION);
        assert_eq!(stepper.advance(DEFAULT_FRAME_DURATION * 3), 3);
        assert_eq!(stepper.index(), 1);
    }

    #[test]
    fn empty_frame_set_is_rejected() {
        assert_eq!(
            AnimatedFrameSet::new(Vec::new(), DEFAULT_FRAME_DURATION),
            Err(AcquireError::Empty)
        );
    }

    #[test]
    fn frame_length_is_validated() {
        assert!(Frame::new(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn canvas_draw_clips_and_marks_dirty() {
        let mut canvas = FrameCanvas::new(2, 2);
        canvas.draw(&solid(3, 1, 9));
        assert!(canvas.take_dirty());
        assert!(!canvas.is_dirty());
        assert_eq!(&canvas.pixels()[..8], &[9; 8]);
        assert_eq!(&canvas.pixels()[8..], &[0; 8]);
    }

    #[test]
    fn close_releases_frames() {
        let mut set = AnimatedFrameSet::new(vec![solid(1, 1, 1)], DEFAULT_FRAME_DURATION).unwrap();
        set.close();
        assert!(set.is_empty());
    }
}
