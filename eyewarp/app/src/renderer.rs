//! Render context: smooths anchors toward the latest detection and draws the warp.

use api::{EyePair, RgbaImage, WarpParameters};
use common::warp::{self, WarpUniforms};
use common::{eye_mapper, Mailbox, TemporalSmoother};
use glam::Mat4;
use log::{info, warn};
use std::time::Instant;

use crate::session::WarnThrottle;

pub struct EyeWarpRenderer {
    targets: Mailbox<EyePair>,
    target: EyePair,
    smoother: TemporalSmoother,
    strength: f32,
    mirror: bool,
    last_params: WarpParameters,
    framebuffer: RgbaImage,
    anomaly_warn: WarnThrottle,
}

impl EyeWarpRenderer {
    pub fn new(targets: Mailbox<EyePair>, width: usize, height: usize) -> Self {
        let defaults = EyePair::default();
        Self {
            targets,
            target: defaults,
            smoother: TemporalSmoother::default(),
            strength: WarpParameters::default().strength,
            mirror: false,
            last_params: WarpParameters::default(),
            framebuffer: RgbaImage::new(width, height),
            anomaly_warn: WarnThrottle::default(),
        }
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = if strength.is_finite() {
            strength.clamp(0.0, WarpParameters::MAX_STRENGTH)
        } else {
            0.0
        };
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if self.framebuffer.width != width || self.framebuffer.height != height {
            self.framebuffer = RgbaImage::new(width, height);
        }
    }

    /// Smoothed anchors in landmark space.
    pub fn anchors(&self) -> EyePair {
        self.smoother.current()
    }

    pub fn framebuffer(&self) -> &RgbaImage {
        &self.framebuffer
    }

    /// Advances the anchors one step and returns this frame's parameters in texture space.
    ///
    /// A non-finite transform keeps the previous frame's parameters.
    pub fn advance(&mut self, tex_matrix: &Mat4) -> WarpParameters {
        if let Some(target) = self.targets.latest() {
            self.target = target;
        }
        let current = self.smoother.advance(&self.target);

        match eye_mapper::to_texture_space(&current, tex_matrix) {
            Ok(eyes) => self.last_params = WarpParameters::new(eyes, self.strength),
            Err(e) => {
                if self.anomaly_warn.ready() {
                    warn!("Keeping previous anchors: {}", e);
                }
                self.last_params.strength = self.strength;
            }
        }
        self.last_params
    }

    /// Uniform block for a GPU draw of the current parameters.
    pub fn uniforms(&self, tex_matrix: &Mat4) -> WarpUniforms {
        WarpUniforms::new(&self.last_params, tex_matrix, self.mirror)
    }

    /// Draws one frame into the framebuffer.
    pub fn draw_frame(&mut self, texture: &RgbaImage, tex_matrix: &Mat4) -> &RgbaImage {
        let params = self.advance(tex_matrix);
        warp::render(texture, &mut self.framebuffer, &params, tex_matrix, self.mirror);
        &self.framebuffer
    }
}

/// Frame counter that logs approximate FPS at a widening interval.
pub struct Throughput {
    label: &'static str,
    frame_count: u64,
    log_interval: u64,
    last_log: Instant,
}

impl Throughput {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            frame_count: 0,
            log_interval: 1000,
            last_log: Instant::now(),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn tick(&mut self) {
        self.frame_count += 1;
        if !self.frame_count.is_multiple_of(self.log_interval) {
            return;
        }

        let elapsed = self.last_log.elapsed().as_secs_f32();
        let fps = self.log_interval as f32 / elapsed;
        info!(
            "{}: {} frames (approx {:.1} FPS)",
            self.label, self.frame_count, fps
        );
        self.last_log = Instant::now();

        if self.frame_count >= 1_000_000 {
            self.log_interval = 1_000_000;
        } else if self.frame_count >= 100_000 {
            self.log_interval = 100_000;
        } else if self.frame_count >= 10_000 {
            self.log_interval = 10_000;
        }
    }
}
