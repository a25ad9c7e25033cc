//! Video sources feeding a [`Session`](crate::Session).

use anyhow::Result;
use api::{FramePayload, Plane, RawFrame, RgbaImage, Rotation};
use common::CaptureConfig;
use glam::Mat4;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Luma rows are padded to this many bytes, like most camera HALs do.
const ROW_ALIGNMENT: usize = 64;

/// One delivery from a video source: the analysis frame plus the display
/// texture and its transform for the same instant.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame: RawFrame,
    pub preview: Arc<RgbaImage>,
    pub tex_matrix: Mat4,
}

/// Something that pushes frames at capture cadence.
pub trait FrameSource: Send {
    /// Blocks until the next frame is due. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>>;
}

/// Generates a moving test pattern in the same plane layout a phone camera delivers:
/// padded luma rows and semi-planar chroma with a pixel stride of 2.
pub struct SyntheticCamera {
    width: usize,
    height: usize,
    interval: Duration,
    paced: bool,
    limit: Option<u64>,
    rotation: Rotation,
    mirror: bool,
    frame_index: u64,
    next_due: Option<Instant>,
}

impl SyntheticCamera {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            width: config.width.max(2) & !1,
            height: config.height.max(2) & !1,
            interval: config.frame_interval(),
            paced: true,
            limit: None,
            rotation: Rotation::Deg0,
            mirror: false,
            frame_index: 0,
            next_due: None,
        }
    }

    /// Stops after `frames` deliveries.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Delivers frames as fast as they are pulled. Timestamps still advance by the frame interval.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn with_orientation(mut self, rotation: Rotation, mirror: bool) -> Self {
        self.rotation = rotation;
        self.mirror = mirror;
        self
    }

    fn timestamp_ms(&self) -> i64 {
        let ms = self.interval.as_secs_f64() * 1000.0 * self.frame_index as f64;
        ms.round() as i64
    }

    fn pace(&mut self) {
        if !self.paced {
            return;
        }
        let now = Instant::now();
        match self.next_due {
            Some(due) if due > now => {
                thread::sleep(due - now);
                self.next_due = Some(due + self.interval);
            }
            _ => self.next_due = Some(now + self.interval),
        }
    }

    fn render(&self, timestamp_ms: i64) -> (RgbaImage, FramePayload) {
        let (w, h) = (self.width, self.height);
        let phase = timestamp_ms as f32 / 1000.0;
        let bar = ((phase * 0.25).fract() * w as f32) as usize;

        let mut preview = RgbaImage::new(w, h);
        let y_stride = w.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT;
        let mut luma = vec![0u8; y_stride * h];
        let mut chroma = vec![0u8; y_stride * (h / 2)];

        for y in 0..h {
            for x in 0..w {
                let r = (x * 255 / w) as u8;
                let g = (y * 255 / h) as u8;
                let b = if x.abs_diff(bar) < w / 32 { 240 } else { 96 };
                preview.set_pixel(x, y, [r, g, b, 255]);

                let (yy, u, v) = rgb_to_yuv(r, g, b);
                luma[y * y_stride + x] = yy;
                if y % 2 == 0 && x % 2 == 0 {
                    let i = (y / 2) * y_stride + x;
                    chroma[i] = u;
                    chroma[i + 1] = v;
                }
            }
        }

        // U and V views into the same interleaved buffer, one byte apart.
        let v_data = chroma[1..].to_vec();
        chroma.truncate(chroma.len().saturating_sub(1));
        let payload = FramePayload::RawPlanar {
            y: Plane::new(luma, y_stride, 1),
            u: Plane::new(chroma, y_stride, 2),
            v: Plane::new(v_data, y_stride, 2),
        };
        (preview, payload)
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>> {
        if self.limit.is_some_and(|limit| self.frame_index >= limit) {
            return Ok(None);
        }
        self.pace();

        let timestamp_ms = self.timestamp_ms();
        let (preview, payload) = self.render(timestamp_ms);
        self.frame_index += 1;

        Ok(Some(CapturedFrame {
            frame: RawFrame {
                width: self.width,
                height: self.height,
                payload,
                rotation: self.rotation,
                mirror: self.mirror,
                timestamp_ms,
            },
            preview: Arc::new(preview),
            tex_matrix: Mat4::IDENTITY,
        }))
    }
}

/// Full-range BT.601, the inverse of the decoder's transform.
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let v = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
    let q = |c: f32| c.round().clamp(0.0, 255.0) as u8;
    (q(y), q(u), q(v))
}
