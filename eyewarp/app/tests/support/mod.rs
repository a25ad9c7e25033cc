#![allow(dead_code)]

use anyhow::{bail, Result};
use api::{LandmarkDetector, LandmarkSet, ModuleLogger, RgbaImage};
use common::eye_mapper::{LEFT_EYE_IDX, RIGHT_EYE_IDX};
use glam::Vec2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MESH_POINTS: usize = 478;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Script {
    Face { left: Vec2, right: Vec2 },
    NoFace,
    Fail,
    NonFinite,
    /// Panics on the first call, then reports a face at the given anchors.
    PanicOnce { left: Vec2, right: Vec2 },
}

/// What the detector observed, shared with the test.
#[derive(Debug, Default)]
pub struct Observed {
    pub released: AtomicUsize,
    pub timestamps: Mutex<Vec<i64>>,
    pub sizes: Mutex<Vec<(usize, usize)>>,
}

impl Observed {
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.timestamps.lock().unwrap().clone()
    }

    pub fn sizes(&self) -> Vec<(usize, usize)> {
        self.sizes.lock().unwrap().clone()
    }
}

pub struct ScriptedDetector {
    script: Script,
    fail_init: bool,
    observed: Arc<Observed>,
}

impl ScriptedDetector {
    pub fn new(script: Script) -> (Self, Arc<Observed>) {
        let observed = Arc::new(Observed::default());
        (
            Self {
                script,
                fail_init: false,
                observed: observed.clone(),
            },
            observed,
        )
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn face(left: Vec2, right: Vec2) -> (Self, Arc<Observed>) {
        Self::new(Script::Face { left, right })
    }
}

pub fn face_landmarks(left: Vec2, right: Vec2) -> LandmarkSet {
    let mut points = vec![Vec2::new(0.5, 0.6); MESH_POINTS];
    for &i in &LEFT_EYE_IDX {
        points[i] = left;
    }
    for &i in &RIGHT_EYE_IDX {
        points[i] = right;
    }
    LandmarkSet::new(points)
}

impl LandmarkDetector for ScriptedDetector {
    fn initialize(&mut self, logger: ModuleLogger) -> Result<()> {
        if self.fail_init {
            bail!("model file missing");
        }
        logger.info("scripted detector ready");
        Ok(())
    }

    fn detect(&mut self, image: &RgbaImage, timestamp_ms: i64) -> Result<Option<LandmarkSet>> {
        let calls = {
            let mut timestamps = self.observed.timestamps.lock().unwrap();
            timestamps.push(timestamp_ms);
            timestamps.len()
        };
        self.observed
            .sizes
            .lock()
            .unwrap()
            .push((image.width, image.height));

        match self.script {
            Script::Face { left, right } => Ok(Some(face_landmarks(left, right))),
            Script::NoFace => Ok(None),
            Script::Fail => bail!("inference failed"),
            Script::NonFinite => Ok(Some(face_landmarks(
                Vec2::new(f32::NAN, 0.5),
                Vec2::new(0.7, 0.5),
            ))),
            Script::PanicOnce { .. } if calls == 1 => panic!("inference graph aborted"),
            Script::PanicOnce { left, right } => Ok(Some(face_landmarks(left, right))),
        }
    }

    fn release(&mut self) {
        self.observed.released.fetch_add(1, Ordering::SeqCst);
    }
}
