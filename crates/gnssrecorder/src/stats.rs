//! Counters shared between producers, the writer thread and observers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lifetime counters of a [`Recorder`](crate::Recorder).
#[derive(Debug, Default)]
pub struct RecorderStats {
    /// Events accepted into the writer queue.
    pub submitted: AtomicU64,
    /// Events dropped because no session was open.
    pub dropped_not_recording: AtomicU64,
    /// Events dropped because the bounded queue was full.
    pub dropped_overloaded: AtomicU64,
    /// Events the writer processed.
    pub written: AtomicU64,
    /// Events the writer failed to persist.
    pub write_failures: AtomicU64,
}

impl RecorderStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_recording(&self) {
        self.dropped_not_recording.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overloaded(&self) {
        self.dropped_overloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped_not_recording: self.dropped_not_recording.load(Ordering::Relaxed),
            dropped_overloaded: self.dropped_overloaded.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RecorderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Events accepted into the writer queue.
    pub submitted: u64,
    /// Events dropped because no session was open.
    pub dropped_not_recording: u64,
    /// Events dropped because the bounded queue was full.
    pub dropped_overloaded: u64,
    /// Events the writer processed.
    pub written: u64,
    /// Events the writer failed to persist.
    pub write_failures: u64,
}
