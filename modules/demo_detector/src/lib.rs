// A detector module that needs no model: it reports a scripted face that
// drifts around the frame, blinks, and occasionally leaves the view.

use anyhow::{bail, Result};
use api::{LandmarkDetector, LandmarkSet, ModuleLogger, RgbaImage};
use glam::Vec2;
use std::f32::consts::TAU;

pub const MESH_POINTS: usize = 478;

const LEFT_EYE_RING: [usize; 8] = [33, 133, 157, 158, 159, 160, 161, 163];
const RIGHT_EYE_RING: [usize; 8] = [362, 385, 386, 387, 388, 390, 263, 373];

const EYE_OFFSET: Vec2 = Vec2::new(0.11, -0.06);
const EYE_HALF_WIDTH: f32 = 0.035;
const EYE_HALF_HEIGHT: f32 = 0.014;
const FACE_HALF_SIZE: Vec2 = Vec2::new(0.22, 0.3);

const BLINK_PERIOD_MS: i64 = 4_000;
const BLINK_MS: i64 = 150;
const ABSENCE_PERIOD_MS: i64 = 12_000;
const ABSENCE_MS: i64 = 1_000;

pub struct DemoDetector {
    logger: Option<ModuleLogger>,
    last_timestamp_ms: Option<i64>,
    frame_count: u64,
    faces_reported: u64,
}

impl DemoDetector {
    pub fn new() -> Self {
        Self {
            logger: None,
            last_timestamp_ms: None,
            frame_count: 0,
            faces_reported: 0,
        }
    }

    /// The scripted face at `timestamp_ms`, or `None` while it is out of view.
    pub fn face_at(timestamp_ms: i64) -> Option<LandmarkSet> {
        if timestamp_ms.rem_euclid(ABSENCE_PERIOD_MS) >= ABSENCE_PERIOD_MS - ABSENCE_MS {
            return None;
        }

        let t = timestamp_ms as f32 / 1000.0;
        let head = Vec2::new(
            0.5 + 0.08 * (t * TAU / 7.0).sin(),
            0.5 + 0.05 * (t * TAU / 5.0).sin(),
        );
        let openness = if timestamp_ms.rem_euclid(BLINK_PERIOD_MS) < BLINK_MS {
            0.1
        } else {
            1.0
        };

        let mut points: Vec<Vec2> = (0..MESH_POINTS)
            .map(|i| {
                let angle = i as f32 / MESH_POINTS as f32 * TAU;
                head + Vec2::new(angle.cos(), angle.sin()) * FACE_HALF_SIZE
            })
            .collect();

        let left_center = head + Vec2::new(-EYE_OFFSET.x, EYE_OFFSET.y);
        let right_center = head + EYE_OFFSET;
        place_ring(&mut points, &LEFT_EYE_RING, left_center, openness);
        place_ring(&mut points, &RIGHT_EYE_RING, right_center, openness);

        Some(LandmarkSet::new(points))
    }
}

impl Default for DemoDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn place_ring(points: &mut [Vec2], ring: &[usize], center: Vec2, openness: f32) {
    let count = ring.len() as f32;
    for (k, &index) in ring.iter().enumerate() {
        let angle = k as f32 / count * TAU;
        points[index] = center
            + Vec2::new(
                angle.cos() * EYE_HALF_WIDTH,
                angle.sin() * EYE_HALF_HEIGHT * openness,
            );
    }
}

impl LandmarkDetector for DemoDetector {
    fn initialize(&mut self, logger: ModuleLogger) -> Result<()> {
        logger.info("Initializing demo detector (scripted face, no model)");
        self.logger = Some(logger);
        Ok(())
    }

    fn detect(&mut self, image: &RgbaImage, timestamp_ms: i64) -> Result<Option<LandmarkSet>> {
        if image.width == 0 || image.height == 0 {
            bail!("empty image");
        }
        if let Some(last) = self.last_timestamp_ms {
            if timestamp_ms <= last {
                bail!("timestamp {} is not after {}", timestamp_ms, last);
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);
        self.frame_count += 1;

        let face = Self::face_at(timestamp_ms);
        if face.is_some() {
            self.faces_reported += 1;
        }

        if let Some(logger) = &self.logger {
            match self.frame_count {
                1 => logger.info(&format!(
                    "First frame: {}x{} at {} ms",
                    image.width, image.height, timestamp_ms
                )),
                100 | 1000 => logger.info(&format!("Frame {} milestone", self.frame_count)),
                _ => logger.trace(&format!("Frame {}", self.frame_count)),
            }
        }

        Ok(face)
    }

    fn release(&mut self) {
        if let Some(logger) = &self.logger {
            logger.info(&format!(
                "Releasing demo detector. Frames: {}, faces: {}",
                self.frame_count, self.faces_reported
            ));
        }
    }
}

#[no_mangle]
#[allow(improper_ctypes_definitions)]
pub extern "C" fn create_module() -> *mut dyn LandmarkDetector {
    Box::into_raw(Box::new(DemoDetector::new()))
}
