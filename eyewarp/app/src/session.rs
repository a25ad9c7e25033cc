//! Wires capture, detection and the anchor mailbox together.
//!
//! Three contexts: the capture thread pulls frames from a [`FrameSource`],
//! publishes the display texture and offers each frame to the
//! [`FrameScheduler`]; the detector thread converts and analyses admitted
//! frames one at a time; the render context (the caller) reads the mailboxes
//! at its own pace.

use anyhow::{Context, Result};
use api::{DetectorAdapter, EyePair, RawFrame, RgbaImage};
use common::{
    convert, eye_mapper, FrameScheduler, JobPermit, Mailbox, PipelineError, WarpConfig,
};
use glam::Mat4;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::source::{CapturedFrame, FrameSource};

const WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Lets a repeated per-frame warning through at most once every few seconds.
#[derive(Debug, Default)]
pub(crate) struct WarnThrottle {
    last: Option<Instant>,
}

impl WarnThrottle {
    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < WARN_INTERVAL => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// The texture most recently delivered for display, with its transform.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub texture: Arc<RgbaImage>,
    pub tex_matrix: Mat4,
    pub timestamp_ms: i64,
}

#[derive(Debug, Default)]
struct SessionStats {
    captured: AtomicU64,
    malformed: AtomicU64,
    detections: AtomicU64,
    no_face: AtomicU64,
    anomalies: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub captured: u64,
    pub admitted: u64,
    pub dropped: u64,
    pub malformed: u64,
    pub detections: u64,
    pub no_face: u64,
    pub anomalies: u64,
}

struct Job {
    frame: RawFrame,
    _permit: JobPermit,
}

/// Runs one admitted frame through conversion, orientation, detection and mapping.
///
/// `Ok(None)` is "no face". Every error is local to this frame.
pub fn process_frame(
    adapter: &mut DetectorAdapter,
    frame: &RawFrame,
) -> Result<Option<EyePair>, PipelineError> {
    let buffer = convert::to_pixel_buffer(frame)?;
    let image = convert::orient(convert::decode_rgba(&buffer), frame.rotation, frame.mirror);

    let Some(landmarks) = adapter.detect(&image, frame.timestamp_ms) else {
        return Ok(None);
    };
    let eyes = eye_mapper::map(&landmarks)?;
    eye_mapper::sanitize(eyes).map(Some)
}

pub struct Session {
    running: Arc<AtomicBool>,
    scheduler: FrameScheduler,
    targets: Mailbox<EyePair>,
    preview: Mailbox<PreviewFrame>,
    stats: Arc<SessionStats>,
    capture: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
    detection_available: bool,
}

impl Session {
    /// Spawns the capture thread and, when a detector is present, the detector thread.
    ///
    /// Without a detector the session still delivers preview frames; anchors
    /// never move and [`Session::effective_strength`] reports 0.
    pub fn start(
        config: &WarpConfig,
        source: Box<dyn FrameSource>,
        detector: Option<DetectorAdapter>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let scheduler = FrameScheduler::new(config.process_interval());
        let targets = Mailbox::new();
        let preview = Mailbox::new();
        let stats = Arc::new(SessionStats::default());
        let detection_available = detector.is_some();

        let (worker, jobs) = match detector {
            Some(adapter) => {
                let (tx, rx) = sync_channel::<Job>(1);
                let handle = spawn_worker(
                    adapter,
                    rx,
                    running.clone(),
                    targets.clone(),
                    stats.clone(),
                )?;
                (Some(handle), Some(tx))
            }
            None => {
                warn!("No landmark detector attached. Running without distortion.");
                (None, None)
            }
        };

        let capture = {
            let running = running.clone();
            let scheduler = scheduler.clone();
            let preview = preview.clone();
            let stats = stats.clone();
            thread::Builder::new()
                .name("capture".into())
                .spawn(move || capture_loop(source, jobs, running, scheduler, preview, stats))
                .context("Failed to spawn capture thread")?
        };

        info!(
            "Session started (process interval {:?}, detection {})",
            config.process_interval(),
            if detection_available { "on" } else { "off" }
        );

        Ok(Self {
            running,
            scheduler,
            targets,
            preview,
            stats,
            capture: Some(capture),
            worker,
            detection_available,
        })
    }

    /// Reader side of the anchor-target slot.
    pub fn targets(&self) -> Mailbox<EyePair> {
        self.targets.clone()
    }

    pub fn latest_preview(&self) -> Option<PreviewFrame> {
        self.preview.latest()
    }

    pub fn detection_available(&self) -> bool {
        self.detection_available
    }

    /// The strength to render with: the requested one, or 0 when detection is unavailable.
    pub fn effective_strength(&self, requested: f32) -> f32 {
        if self.detection_available {
            requested
        } else {
            0.0
        }
    }

    /// Whether the capture thread is still delivering frames.
    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stats(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            captured: load(&self.stats.captured),
            admitted: self.scheduler.accepted(),
            dropped: self.scheduler.dropped(),
            malformed: load(&self.stats.malformed),
            detections: load(&self.stats.detections),
            no_face: load(&self.stats.no_face),
            anomalies: load(&self.stats.anomalies),
        }
    }

    /// Stops both threads and releases the detector. Safe to call more than once.
    pub fn shutdown(&mut self) -> StatsSnapshot {
        self.running.store(false, Ordering::SeqCst);

        // Capture owns the job sender; once it exits the detector thread drains and stops.
        if let Some(handle) = self.capture.take() {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Detector thread panicked");
            }
        }

        let stats = self.stats();
        info!("Session stopped: {:?}", stats);
        stats
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.capture.is_some() || self.worker.is_some() {
            self.shutdown();
        }
    }
}

fn spawn_worker(
    mut adapter: DetectorAdapter,
    jobs: Receiver<Job>,
    running: Arc<AtomicBool>,
    targets: Mailbox<EyePair>,
    stats: Arc<SessionStats>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("detector".into())
        .spawn(move || {
            info!("Detector thread started ({})", adapter.name());
            let mut malformed_warn = WarnThrottle::default();
            let mut anomaly_warn = WarnThrottle::default();

            while let Ok(job) = jobs.recv() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                match process_frame(&mut adapter, &job.frame) {
                    Ok(Some(eyes)) => {
                        #[cfg(feature = "xtralog")]
                        debug!("Detection at {} ms: {:?}", job.frame.timestamp_ms, eyes);
                        targets.publish(eyes);
                        stats.detections.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(None) => {
                        stats.no_face.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(PipelineError::MalformedFrame(reason)) => {
                        stats.malformed.fetch_add(1, Ordering::Relaxed);
                        if malformed_warn.ready() {
                            warn!("Dropping malformed frame: {}", reason);
                        }
                    }
                    Err(e) => {
                        stats.anomalies.fetch_add(1, Ordering::Relaxed);
                        if anomaly_warn.ready() {
                            warn!("Discarding detection update: {}", e);
                        }
                    }
                }
                // Dropping the job clears the scheduler's busy flag.
            }

            adapter.release();
            info!(
                "Detector thread stopped ({} detector failures)",
                adapter.failures()
            );
        })
        .context("Failed to spawn detector thread")
}

fn capture_loop(
    mut source: Box<dyn FrameSource>,
    mut jobs: Option<SyncSender<Job>>,
    running: Arc<AtomicBool>,
    scheduler: FrameScheduler,
    preview: Mailbox<PreviewFrame>,
    stats: Arc<SessionStats>,
) {
    info!("Capture thread started");
    let mut source_warn = WarnThrottle::default();

    while running.load(Ordering::SeqCst) {
        let CapturedFrame {
            frame,
            preview: texture,
            tex_matrix,
        } = match source.next_frame() {
            Ok(Some(captured)) => captured,
            Ok(None) => {
                info!("Video source exhausted");
                break;
            }
            Err(e) => {
                if source_warn.ready() {
                    warn!("Video source error: {}", e);
                }
                thread::sleep(Duration::from_millis(5));
                continue;
            }
        };
        stats.captured.fetch_add(1, Ordering::Relaxed);

        preview.publish(PreviewFrame {
            texture,
            tex_matrix,
            timestamp_ms: frame.timestamp_ms,
        });

        let Some(tx) = jobs.as_ref() else {
            continue;
        };
        let Some(permit) = scheduler.try_admit(frame.timestamp_ms) else {
            continue;
        };
        match tx.try_send(Job {
            frame,
            _permit: permit,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("Detector queue full, dropping frame");
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("Detector thread is gone. Continuing without detection.");
                jobs = None;
            }
        }
    }

    info!("Capture thread stopped");
}
