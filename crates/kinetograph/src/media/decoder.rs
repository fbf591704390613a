use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use super::types::DecodedFrame;
use crate::error::DecodeError;

/// Produces the image for a given frame index.
///
/// `decode` is called synchronously from the engine loop; the returned frame
/// is always complete.
pub trait FrameDecoder: Send {
    /// Opens the resources produced by the loader.
    fn open(&mut self, resources: &[PathBuf]) -> Result<(), DecodeError>;
    fn num_frames(&self) -> usize;
    fn decode(&mut self, index: usize) -> Result<DecodedFrame, DecodeError>;
    /// Frame duration stored in the resource, if the format carries one.
    fn frame_duration_hint(&self) -> Option<Duration> {
        None
    }
    fn close(&mut self) {}
}

/// Serves frames that were decoded up front.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameDecoder {
    frames: Vec<DecodedFrame>,
    frame_duration: Option<Duration>,
}

impl MemoryFrameDecoder {
    pub fn new(frames: Vec<DecodedFrame>) -> Self {
        Self {
            frames,
            frame_duration: None,
        }
    }

    pub fn with_frame_duration(mut self, duration: Duration) -> Self {
        self.frame_duration = Some(duration);
        self
    }
}

impl FrameDecoder for MemoryFrameDecoder {
    fn open(&mut self, _resources: &[PathBuf]) -> Result<(), DecodeError> {
        if self.frames.is_empty() {
            return Err(DecodeError::Format("no frames".to_string()));
        }
        Ok(())
    }

    fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn decode(&mut self, index: usize) -> Result<DecodedFrame, DecodeError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(DecodeError::OutOfRange {
                index,
                num_frames: self.frames.len(),
            })
    }

    fn frame_duration_hint(&self) -> Option<Duration> {
        self.frame_duration
    }
}

/// Animated GIF decoder. Frames are composited and kept in memory on `open`.
#[derive(Debug, Default)]
pub struct GifFrameDecoder {
    frames: Vec<DecodedFrame>,
    delays_ms: Vec<u32>,
    opened: bool,
}

impl GifFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays_ms(&self) -> &[u32] {
        &self.delays_ms
    }
}

impl FrameDecoder for GifFrameDecoder {
    fn open(&mut self, resources: &[PathBuf]) -> Result<(), DecodeError> {
        let path = resources
            .iter()
            .find(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("gif"))
            })
            .ok_or_else(|| DecodeError::Format("no .gif resource to open".to_string()))?;

        let file = File::open(path)
            .map_err(|e| DecodeError::Format(format!("failed to open {}: {e}", path.display())))?;
        let (frames, delays_ms) = decode_gif(file)?;

        if let Some(first) = frames.first() {
            log::info!(
                "Opened GIF {}: {}x{}, {} frames",
                path.display(),
                first.width,
                first.height,
                frames.len()
            );
        }
        self.frames = frames;
        self.delays_ms = delays_ms;
        self.opened = true;
        Ok(())
    }

    fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn decode(&mut self, index: usize) -> Result<DecodedFrame, DecodeError> {
        if !self.opened {
            return Err(DecodeError::NotOpen);
        }
        self.frames
            .get(index)
            .cloned()
            .ok_or(DecodeError::OutOfRange {
                index,
                num_frames: self.frames.len(),
            })
    }

    /// Average of the per-frame delays; the engine runs at a fixed rate.
    fn frame_duration_hint(&self) -> Option<Duration> {
        if self.delays_ms.is_empty() {
            return None;
        }
        let total: u64 = self.delays_ms.iter().map(|&d| d as u64).sum();
        Some(Duration::from_millis(total / self.delays_ms.len() as u64))
    }

    fn close(&mut self) {
        self.frames.clear();
        self.delays_ms.clear();
        self.opened = false;
    }
}

/// Largest logical screen that will be composited (RGBA bytes).
const MAX_CANVAS_BYTES: usize = 256 * 1024 * 1024;

/// Shorter delays are treated as unset, the way browsers play them.
const MIN_DELAY_MS: u32 = 20;

/// The GIF logical screen that frames are drawn onto.
struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

/// A frame's rectangle after clipping to the logical screen.
#[derive(Debug, Clone, Copy)]
struct Region {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

impl Canvas {
    fn new(width: u16, height: u16) -> Result<Self, DecodeError> {
        let (w, h) = (usize::from(width), usize::from(height));
        let len = w
            .checked_mul(h)
            .and_then(|n| n.checked_mul(4))
            .filter(|&n| n > 0 && n <= MAX_CANVAS_BYTES)
            .ok_or_else(|| {
                DecodeError::Format(format!("unsupported {width}x{height} logical screen"))
            })?;
        Ok(Self {
            width: w,
            height: h,
            pixels: vec![0; len],
        })
    }

    fn region(&self, frame: &gif::Frame<'_>) -> Option<Region> {
        let left = usize::from(frame.left);
        let top = usize::from(frame.top);
        if left >= self.width || top >= self.height {
            return None;
        }
        let region = Region {
            left,
            top,
            width: usize::from(frame.width).min(self.width - left),
            height: usize::from(frame.height).min(self.height - top),
        };
        (region.width > 0 && region.height > 0).then_some(region)
    }

    fn row_span(&self, region: Region, row: usize) -> std::ops::Range<usize> {
        let start = ((region.top + row) * self.width + region.left) * 4;
        start..start + region.width * 4
    }

    /// Fully transparent source pixels leave the canvas untouched.
    fn draw(&mut self, frame: &gif::Frame<'_>) {
        let Some(region) = self.region(frame) else {
            return;
        };
        let stride = usize::from(frame.width) * 4;
        for row in 0..region.height {
            let offset = row * stride;
            let Some(src) = frame.buffer.get(offset..offset + region.width * 4) else {
                log::warn!("GIF frame buffer shorter than its rectangle; truncating");
                return;
            };
            let span = self.row_span(region, row);
            for (dst, px) in self.pixels[span].chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                if px[3] > 0 {
                    dst.copy_from_slice(px);
                }
            }
        }
    }

    fn clear(&mut self, frame: &gif::Frame<'_>) {
        if let Some(region) = self.region(frame) {
            for row in 0..region.height {
                let span = self.row_span(region, row);
                self.pixels[span].fill(0);
            }
        }
    }

    fn snapshot(&self) -> DecodedFrame {
        DecodedFrame::new(self.pixels.clone(), self.width as u32, self.height as u32)
    }
}

/// Decodes every frame of an animated GIF into full-screen RGBA images,
/// applying each frame's disposal method before the next one is drawn.
/// Returns the frames and their delays in milliseconds.
pub fn decode_gif<R: Read>(reader: R) -> Result<(Vec<DecodedFrame>, Vec<u32>), DecodeError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut reader = options
        .read_info(reader)
        .map_err(|e| DecodeError::Format(format!("failed to decode GIF: {e}")))?;

    let mut canvas = Canvas::new(reader.width(), reader.height())?;
    let mut frames = Vec::new();
    let mut delays_ms = Vec::new();

    loop {
        let index = frames.len();
        let frame = match reader.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                return Err(DecodeError::Frame {
                    index,
                    reason: e.to_string(),
                });
            }
        };

        // delay is in centiseconds
        delays_ms.push((u32::from(frame.delay) * 10).max(MIN_DELAY_MS));

        let restore = (frame.dispose == gif::DisposalMethod::Previous)
            .then(|| canvas.pixels.clone());
        canvas.draw(frame);
        frames.push(canvas.snapshot());

        match frame.dispose {
            gif::DisposalMethod::Background => canvas.clear(frame),
            gif::DisposalMethod::Previous => {
                if let Some(pixels) = restore {
                    canvas.pixels = pixels;
                }
            }
            _ => {}
        }
    }

    if frames.is_empty() {
        return Err(DecodeError::Format("GIF has no frames".to_string()));
    }
    Ok((frames, delays_ms))
}
