mod adapter;
pub use adapter::DetectorAdapter;

use anyhow::Result;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// One sensor plane with its own addressing. `row_stride` is the byte distance
/// between the starts of two consecutive rows and frequently exceeds the
/// visible width; `pixel_stride` is the byte distance between two samples of
/// the same row (2 when the chroma channels are already interleaved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }
}

/// Payload of a captured frame, resolved once at the capture boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// Three planes: full resolution luma, then the two half resolution chroma planes (U, V).
    RawPlanar { y: Plane, u: Plane, v: Plane },
    /// Tightly packed luma followed by interleaved V/U chroma, already in [`PixelBuffer`] order.
    RawInterleaved(Vec<u8>),
}

/// Clockwise rotation needed to bring a sensor frame upright on the display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// A frame as delivered by the video source. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: usize,
    pub height: usize,
    pub payload: FramePayload,
    pub rotation: Rotation,
    pub mirror: bool,
    pub timestamp_ms: i64,
}

/// Luma plane followed by half resolution V/U interleaved chroma.
///
/// Always exactly `width * height + width * height / 2` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn required_len(width: usize, height: usize) -> usize {
        width * height + width * height / 2
    }

    /// Zero filled buffer of the right size.
    pub fn zeroed(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; Self::required_len(width, height)],
        }
    }

    /// Wraps existing bytes, rejecting anything that is not exactly the required length.
    pub fn from_bytes(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != Self::required_len(width, height) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn luma(&self) -> &[u8] {
        &self.data[..self.width * self.height]
    }

    pub fn chroma(&self) -> &[u8] {
        &self.data[self.width * self.height..]
    }
}

/// Top-down 4 channel RGBA image, 8 bits per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbaImage {
    pub const CHANNELS: usize = 4;

    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * Self::CHANNELS],
        }
    }

    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width * height * Self::CHANNELS);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * Self::CHANNELS;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let i = (y * self.width + x) * Self::CHANNELS;
        self.data[i..i + Self::CHANNELS].copy_from_slice(&rgba);
    }
}

/// Normalized landmark points, origin top-left, Y pointing down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Vec2>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Vec2> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }
}

impl From<Vec<Vec2>> for LandmarkSet {
    fn from(points: Vec<Vec2>) -> Self {
        Self::new(points)
    }
}

/// Distortion anchor for one eye, normalized UV space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeAnchor {
    pub center: Vec2,
    pub radius: f32,
}

impl EyeAnchor {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Both anchors. The radius is shared, so `left.radius == right.radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyePair {
    pub left: EyeAnchor,
    pub right: EyeAnchor,
}

impl EyePair {
    pub fn new(left: Vec2, right: Vec2, radius: f32) -> Self {
        Self {
            left: EyeAnchor::new(left, radius),
            right: EyeAnchor::new(right, radius),
        }
    }

    pub fn radius(&self) -> f32 {
        self.left.radius
    }

    pub fn is_finite(&self) -> bool {
        self.left.center.is_finite()
            && self.right.center.is_finite()
            && self.left.radius.is_finite()
            && self.right.radius.is_finite()
    }
}

impl Default for EyePair {
    fn default() -> Self {
        Self::new(Vec2::new(0.3, 0.5), Vec2::new(0.7, 0.5), 0.08)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpParameters {
    pub left_eye: EyeAnchor,
    pub right_eye: EyeAnchor,
    pub strength: f32,
}

impl WarpParameters {
    pub const MAX_STRENGTH: f32 = 1.2;

    pub fn new(eyes: EyePair, strength: f32) -> Self {
        Self {
            left_eye: eyes.left,
            right_eye: eyes.right,
            strength: strength.clamp(0.0, Self::MAX_STRENGTH),
        }
    }
}

impl Default for WarpParameters {
    fn default() -> Self {
        Self::new(EyePair::default(), 0.5)
    }
}

/// log level for module logging
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

/// logger callback for modules
pub type LogCallback = extern "C" fn(level: LogLevel, target: *const i8, message: *const i8);

/// Logger interface for detector modules
pub struct ModuleLogger {
    callback: LogCallback,
    module_name: String,
}

impl ModuleLogger {
    pub fn new(callback: LogCallback, module_name: String) -> Self {
        Self {
            callback,
            module_name,
        }
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        // Interior NULs cannot cross the C boundary; drop them rather than the message.
        let target = to_c_string(&self.module_name);
        let msg = to_c_string(message);
        (self.callback)(level, target.as_ptr(), msg.as_ptr());
    }
}

fn to_c_string(s: &str) -> std::ffi::CString {
    std::ffi::CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// An opaque face landmark detector.
///
/// `detect` requires strictly increasing timestamps per instance. Callers in
/// the pipeline go through [`DetectorAdapter`], which enforces that and turns
/// every failure into "no face".
pub trait LandmarkDetector: Send {
    fn initialize(&mut self, logger: ModuleLogger) -> Result<()>;
    fn detect(&mut self, image: &RgbaImage, timestamp_ms: i64) -> Result<Option<LandmarkSet>>;
    fn release(&mut self);
}
