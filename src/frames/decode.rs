use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;

use super::{AcquireError, AnimatedFrameSet, Frame};

/// Largest RGBA canvas the patch decoder will allocate, in bytes.
pub const CANVAS_MEMORY_LIMIT: usize = 50_000_000;

#[derive(Debug, Clone)]
pub struct FrameAsset {
    pub url: String,
    /// Downloaded bytes; `None` when the download itself failed.
    pub bytes: Option<Arc<[u8]>>,
    pub frame_duration: Duration,
}

impl FrameAsset {
    pub fn new(url: impl Into<String>, bytes: Option<Vec<u8>>, frame_duration: Duration) -> Self {
        Self {
            url: url.into(),
            bytes: bytes.map(Arc::from),
            frame_duration,
        }
    }

    fn gif_bytes(&self) -> Result<&[u8], AcquireError> {
        let bytes = self
            .bytes
            .as_deref()
            .ok_or(AcquireError::Unsupported("asset bytes unavailable"))?;
        if !bytes.starts_with(b"GIF8") {
            return Err(AcquireError::Unsupported("asset is not a GIF"));
        }
        Ok(bytes)
    }
}

/// An image whose animation is driven by its host, not by our stepper.
pub trait LiveImage {
    fn capture(&mut self) -> Option<Frame>;

    fn release(&mut self) {}
}

pub enum FrameSource {
    Sequence(AnimatedFrameSet),
    Live(Box<dyn LiveImage>),
}

impl FrameSource {
    pub fn release(&mut self) {
        match self {
            Self::Sequence(frames) => frames.close(),
            Self::Live(image) => image.release(),
        }
    }
}

impl fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(frames) => f
                .debug_tuple("Sequence")
                .field(&frames.len())
                .finish(),
            Self::Live(_) => f.write_str("Live"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Full-canvas decoder that composites every frame.
    CompositingDecoder,
    /// Raw frame decompression with manual patch compositing.
    FrameLibrary,
    /// Host-animated image; cadence is whatever the host does.
    LegacyElement,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::CompositingDecoder => "compositing decoder",
            Self::FrameLibrary => "frame library",
            Self::LegacyElement => "legacy element",
        }
    }
}

pub trait FrameStrategy {
    fn kind(&self) -> StrategyKind;
    fn acquire(&self, asset: &FrameAsset) -> Result<FrameSource, AcquireError>;
}

fn decode_error(err: impl fmt::Display) -> AcquireError {
    AcquireError::Decode(err.to_string())
}

/// Decodes through `image`'s animation API, which yields composited frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositingDecoder;

impl FrameStrategy for CompositingDecoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CompositingDecoder
    }

    fn acquire(&self, asset: &FrameAsset) -> Result<FrameSource, AcquireError> {
        let bytes = asset.gif_bytes()?;
        let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(decode_error)?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(decode_error)?
            .into_iter()
            .map(|frame| {
                let buffer = frame.into_buffer();
                let (width, height) = buffer.dimensions();
                Frame::new(width, height, buffer.into_raw())
            })
            .collect::<Result<Vec<_>, _>>()?;
        let frames = AnimatedFrameSet::new(frames, asset.frame_duration)?;
        Ok(FrameSource::Sequence(frames))
    }
}

/// Reads raw frame patches with the `gif` crate and composites them onto a
/// running canvas, honouring each frame's disposal method.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchDecoder;

impl FrameStrategy for PatchDecoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FrameLibrary
    }

    fn acquire(&self, asset: &FrameAsset) -> Result<FrameSource, AcquireError> {
        let bytes = asset.gif_bytes()?;
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options
            .read_info(Cursor::new(bytes))
            .map_err(decode_error)?;
        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        let canvas_bytes = width as usize * height as usize * 4;
        if canvas_bytes > CANVAS_MEMORY_LIMIT {
            return Err(AcquireError::Decode(format!(
                "logical screen {width}x{height} exceeds the canvas memory limit"
            )));
        }
        let mut canvas = vec![0u8; canvas_bytes];
        let mut frames = Vec::new();

        while let Some(patch) = decoder.read_next_frame().map_err(decode_error)? {
            let restore = (patch.dispose == gif::DisposalMethod::Previous).then(|| canvas.clone());
            let rect = PatchRect::from_frame(patch, width, height);
            draw_patch(&mut canvas, width, &rect, &patch.buffer);
            frames.push(Frame::new(width, height, canvas.clone())?);
            match patch.dispose {
                gif::DisposalMethod::Background => clear_rect(&mut canvas, width, &rect),
                gif::DisposalMethod::Previous => {
                    if let Some(previous) = restore {
                        canvas = previous;
                    }
                }
                _ => {}
            }
        }

        let frames = AnimatedFrameSet::new(frames, asset.frame_duration)?;
        Ok(FrameSource::Sequence(frames))
    }
}

struct PatchRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    stride: u32,
}

impl PatchRect {
    fn from_frame(frame: &gif::Frame<'_>, screen_width: u32, screen_height: u32) -> Self {
        let left = u32::from(frame.left);
        let top = u32::from(frame.top);
        Self {
            left,
            top,
            width: u32::from(frame.width).min(screen_width.saturating_sub(left)),
            height: u32::from(frame.height).min(screen_height.saturating_sub(top)),
            stride: u32::from(frame.width),
        }
    }
}

fn draw_patch(canvas: &mut [u8], screen_width: u32, rect: &PatchRect, patch: &[u8]) {
    for row in 0..rect.height {
        for col in 0..rect.width {
            let src = ((row * rect.stride + col) * 4) as usize;
            let Some(pixel) = patch.get(src..src + 4) else {
                continue;
            };
            if pixel[3] == 0 {
                continue;
            }
            let dst = (((rect.top + row) * screen_width + rect.left + col) * 4) as usize;
            canvas[dst..dst + 4].copy_from_slice(pixel);
        }
    }
}

fn clear_rect(canvas: &mut [u8], screen_width: u32, rect: &PatchRect) {
    for row in 0..rect.height {
        let start = (((rect.top + row) * screen_width + rect.left) * 4) as usize;
        canvas[start..start + rect.width as usize * 4].fill(0);
    }
}

/// Last resort outside the browser: the first frame as a still image.
#[derive(Debug, Clone, Copy, Default)]
pub struct StillImage;

impl FrameStrategy for StillImage {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LegacyElement
    }

    fn acquire(&self, asset: &FrameAsset) -> Result<FrameSource, AcquireError> {
        let bytes = asset
            .bytes
            .as_deref()
            .ok_or(AcquireError::Unsupported("asset bytes unavailable"))?;
        let image = image::load_from_memory(bytes)
            .map_err(decode_error)?
            .to_rgba8();
        let (width, height) = image.dimensions();
        let frame = Frame::new(width, height, image.into_raw())?;
        Ok(FrameSource::Live(Box::new(StillFrame(Some(frame)))))
    }
}

struct StillFrame(Option<Frame>);

impl LiveImage for StillFrame {
    fn capture(&mut self) -> Option<Frame> {
        self.0.take()
    }

    fn release(&mut self) {
        self.0 = None;
    }
}

pub fn default_strategies() -> Vec<Box<dyn FrameStrategy>> {
    vec![
        Box::new(CompositingDecoder),
        Box::new(PatchDecoder),
        Box::new(StillImage),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::borrow::Cow;

    const PALETTE: &[u8] = &[0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];

    /// Three 2x2 frames: solid red, green, blue.
    pub(crate) static RGB_GIF: Lazy<Vec<u8>> = Lazy::new(|| {
        encode(|encoder| {
            for index in 1..=3u8 {
                let mut frame = gif::Frame::default();
                frame.width = 2;
                frame.height = 2;
                frame.delay = 5;
                frame.buffer = Cow::Owned(vec![index; 4]);
                encoder.write_frame(&frame).unwrap();
            }
        })
    });

    fn encode(write: impl FnOnce(&mut gif::Encoder<&mut Vec<u8>>)) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut bytes, 2, 2, PALETTE).unwrap();
            encoder.set_repeat(gif::Repeat::Infinite).unwrap();
            write(&mut encoder);
        }
        bytes
    }

    fn asset(bytes: &[u8]) -> FrameAsset {
        FrameAsset::new("/fire.gif", Some(bytes.to_vec()), Duration::from_millis(50))
    }

    fn sequence(source: FrameSource) -> AnimatedFrameSet {
        match source {
            FrameSource::Sequence(frames) => frames,
            FrameSource::Live(_) => panic!("expected a frame sequence"),
        }
    }

    #[test]
    fn compositing_decoder_reads_every_frame() {
        let frames = sequence(CompositingDecoder.acquire(&asset(&RGB_GIF)).unwrap());
        assert_eq!(frames.len(), 3);
        assert_eq!(frames.dimensions(), (2, 2));
        assert_eq!(&frames.get(1).unwrap().rgba[..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn patch_decoder_matches_compositing_decoder() {
        let composited = sequence(CompositingDecoder.acquire(&asset(&RGB_GIF)).unwrap());
        let patched = sequence(PatchDecoder.acquire(&asset(&RGB_GIF)).unwrap());
        assert_eq!(composited.len(), patched.len());
        for index in 0..patched.len() {
            assert_eq!(composited.get(index), patched.get(index));
        }
    }

    #[test]
    fn patches_only_cover_their_rectangle() {
        let bytes = encode(|encoder| {
            let mut base = gif::Frame::default();
            base.width = 2;
            base.height = 2;
            base.buffer = Cow::Owned(vec![1; 4]);
            base.dispose = gif::DisposalMethod::Keep;
            encoder.write_frame(&base).unwrap();

            let mut patch = gif::Frame::default();
            patch.left = 1;
            patch.top = 1;
            patch.width = 1;
            patch.height = 1;
            patch.buffer = Cow::Owned(vec![3]);
            encoder.write_frame(&patch).unwrap();
        });
        let frames = sequence(PatchDecoder.acquire(&asset(&bytes)).unwrap());
        let second = &frames.get(1).unwrap().rgba;
        assert_eq!(&second[..4], &[255, 0, 0, 255]);
        assert_eq!(&second[12..16], &[0, 0, 255, 255]);
    }

    #[test]
    fn missing_bytes_are_unsupported() {
        let asset = FrameAsset::new("/fire.gif", None, Duration::from_millis(50));
        for strategy in default_strategies() {
            assert!(matches!(
                strategy.acquire(&asset),
                Err(AcquireError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn non_gif_bytes_are_unsupported_for_decoders() {
        let asset = asset(b"\x89PNG\r\n");
        assert!(matches!(
            PatchDecoder.acquire(&asset),
            Err(AcquireError::Unsupported(_))
        ));
    }

    #[test]
    fn oversized_logical_screen_is_refused() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&12_000u16.to_le_bytes());
        bytes.extend_from_slice(&12_000u16.to_le_bytes());
        // Two-entry global palette, then the trailer.
        bytes.extend_from_slice(&[0x80, 0, 0, 0, 0, 0, 255, 255, 255, 0x3b]);
        assert!(matches!(
            PatchDecoder.acquire(&asset(&bytes)),
            Err(AcquireError::Decode(message)) if message.contains("12000x12000")
        ));
    }

    #[test]
    fn still_image_yields_first_frame_once() {
        let source = StillImage.acquire(&asset(&RGB_GIF)).unwrap();
        let FrameSource::Live(mut image) = source else {
            panic!("expected a live image");
        };
        let frame = image.capture().unwrap();
        assert_eq!(&frame.rgba[..4], &[255, 0, 0, 255]);
        assert!(image.capture().is_none());
    }
}
