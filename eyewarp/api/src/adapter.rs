//! Fail-closed wrapper around a loaded [`LandmarkDetector`].
//!
//! The pipeline never sees a detector error: anything the module reports is
//! logged and surfaces as "no face", so the anchors simply stop moving. A
//! panic inside the module is caught and treated the same way.

use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use log::{debug, warn};

use crate::{LandmarkDetector, LandmarkSet, ModuleLogger, RgbaImage};

pub struct DetectorAdapter {
    name: String,
    detector: Option<Box<dyn LandmarkDetector>>,
    last_timestamp_ms: Option<i64>,
    failures: u64,
}

impl DetectorAdapter {
    pub fn new(name: impl Into<String>, detector: Box<dyn LandmarkDetector>) -> Self {
        Self {
            name: name.into(),
            detector: Some(detector),
            last_timestamp_ms: None,
            failures: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initialize(&mut self, logger: ModuleLogger) -> Result<()> {
        match self.detector.as_mut() {
            Some(detector) => detector.initialize(logger),
            None => anyhow::bail!("detector '{}' was already released", self.name),
        }
    }

    /// Runs detection. Returns `None` for "no face" and for any failure.
    pub fn detect(&mut self, image: &RgbaImage, timestamp_ms: i64) -> Option<LandmarkSet> {
        let detector = self.detector.as_mut()?;

        let timestamp_ms = match self.last_timestamp_ms {
            Some(last) if timestamp_ms <= last => {
                #[cfg(feature = "xtralog")]
                debug!(
                    "Detector '{}': timestamp {} not after {}, bumping",
                    self.name, timestamp_ms, last
                );
                last.saturating_add(1)
            }
            _ => timestamp_ms,
        };
        self.last_timestamp_ms = Some(timestamp_ms);

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| detector.detect(image, timestamp_ms)));
        match outcome {
            Ok(Ok(Some(landmarks))) if !landmarks.is_empty() => Some(landmarks),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                self.failures += 1;
                warn!(
                    "Detector '{}' failed at {} ms ({} failures so far): {}",
                    self.name, timestamp_ms, self.failures, e
                );
                None
            }
            Err(payload) => {
                self.failures += 1;
                warn!(
                    "Detector '{}' panicked at {} ms ({} failures so far): {}",
                    self.name,
                    timestamp_ms,
                    self.failures,
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn is_released(&self) -> bool {
        self.detector.is_none()
    }

    /// Releases the underlying module. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut detector) = self.detector.take() {
            debug!("Releasing detector '{}'", self.name);
            detector.release();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

impl Drop for DetectorAdapter {
    fn drop(&mut self) {
        self.release();
    }
}
