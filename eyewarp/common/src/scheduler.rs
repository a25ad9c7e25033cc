//! Admission control for the detection worker.
//!
//! At most one job is in flight. A frame is admitted only when the worker is
//! idle and the configured interval has passed since the last admitted frame;
//! everything else is dropped, never queued.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PROCESS_INTERVAL: Duration = Duration::from_millis(50);

const NEVER: i64 = i64::MIN;

#[derive(Debug)]
struct SchedulerState {
    interval_ms: i64,
    busy: AtomicBool,
    last_accepted_ms: AtomicI64,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

/// Cheap to clone; clones share the same busy flag.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    state: Arc<SchedulerState>,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESS_INTERVAL)
    }
}

impl FrameScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Arc::new(SchedulerState {
                interval_ms: i64::try_from(interval.as_millis()).unwrap_or(i64::MAX),
                busy: AtomicBool::new(false),
                last_accepted_ms: AtomicI64::new(NEVER),
                accepted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Tries to admit a frame captured at `timestamp_ms`.
    ///
    /// The returned permit keeps the scheduler busy until it is dropped, so a
    /// job that fails or panics still frees the worker.
    pub fn try_admit(&self, timestamp_ms: i64) -> Option<JobPermit> {
        let state = &self.state;

        if state
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            state.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Only the busy holder touches `last_accepted_ms`.
        let last = state.last_accepted_ms.load(Ordering::Acquire);
        if last != NEVER && timestamp_ms.saturating_sub(last) < state.interval_ms {
            state.busy.store(false, Ordering::Release);
            state.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        state.last_accepted_ms.store(timestamp_ms, Ordering::Release);
        state.accepted.fetch_add(1, Ordering::Relaxed);
        Some(JobPermit {
            state: Arc::clone(&self.state),
        })
    }

    /// Admits and immediately completes a job. Returns whether the frame was accepted.
    pub fn submit(&self, timestamp_ms: i64) -> bool {
        self.try_admit(timestamp_ms).is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::Acquire)
    }

    pub fn accepted(&self) -> u64 {
        self.state.accepted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.state.dropped.load(Ordering::Relaxed)
    }
}

/// Proof that a job was admitted. Dropping it clears the busy flag.
#[derive(Debug)]
pub struct JobPermit {
    state: Arc<SchedulerState>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.state.busy.store(false, Ordering::Release);
    }
}
