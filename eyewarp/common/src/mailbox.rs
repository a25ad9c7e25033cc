//! Single-slot, latest-value handoff between two threads.
//!
//! A writer overwrites the slot; a reader copies whatever is newest. Readers
//! never block on writers for longer than a copy, and nothing is queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
struct Slot<T> {
    value: Mutex<Option<T>>,
    version: AtomicU64,
}

#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                value: Mutex::new(None),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Replaces the slot content.
    pub fn publish(&self, value: T) {
        let mut guard = self
            .slot
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(value);
        self.slot.version.fetch_add(1, Ordering::Release);
    }

    /// Number of values published so far.
    pub fn version(&self) -> u64 {
        self.slot.version.load(Ordering::Acquire)
    }
}

impl<T: Clone> Mailbox<T> {
    /// Copy of the newest value, if anything was ever published.
    pub fn latest(&self) -> Option<T> {
        self.slot
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Newest value only if it is newer than `seen`; updates `seen`.
    pub fn latest_since(&self, seen: &mut u64) -> Option<T> {
        let version = self.version();
        if version == *seen {
            return None;
        }
        *seen = version;
        self.latest()
    }
}
